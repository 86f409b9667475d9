//! JSON input files read by the CLI commands.
//!
//! Calls use the [`ProposedCall`] wire shapes, so ids may be missing and
//! arguments may be either structured JSON or an already-serialized string.

use serde::Deserialize;
use serde_json::Value;
use toolbridge_domain::{
    AssistantResponse, BridgeError, ChoiceError, DependencyMap, FinishReason, IdSource,
    ProposedCall, ToolChoice, ToolResultMessage,
};

/// Input of `toolbridge coordinate`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BatchInput {
    Calls(Vec<ProposedCall>),
    Detailed {
        calls: Vec<ProposedCall>,
        #[serde(default)]
        hints: DependencyMap,
    },
}

impl BatchInput {
    pub fn into_parts(self) -> (Vec<ProposedCall>, DependencyMap) {
        match self {
            BatchInput::Calls(calls) => (calls, DependencyMap::new()),
            BatchInput::Detailed { calls, hints } => (calls, hints),
        }
    }
}

/// One model turn as it arrives from upstream.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TurnInput {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ProposedCall>,
    #[serde(default)]
    pub finish_reason: Option<FinishReason>,
    /// Directive sent with the request; absent means `auto`.
    #[serde(default)]
    pub tool_choice: Option<Value>,
}

impl TurnInput {
    /// The directive carried by the file, if any.
    pub fn choice(&self) -> Result<Option<ToolChoice>, ChoiceError> {
        self.tool_choice
            .as_ref()
            .map(ToolChoice::from_value)
            .transpose()
    }

    /// Normalize the calls and build the response. A missing finish marker
    /// is inferred from whether calls are present.
    pub fn into_response(self, ids: &dyn IdSource) -> Result<AssistantResponse, BridgeError> {
        let tool_calls = self
            .tool_calls
            .into_iter()
            .map(|call| call.into_request(ids))
            .collect::<Result<Vec<_>, _>>()?;
        let finish_reason = self.finish_reason.or_else(|| {
            Some(if tool_calls.is_empty() {
                FinishReason::Stop
            } else {
                FinishReason::ToolCalls
            })
        });
        Ok(AssistantResponse {
            content: self.content,
            tool_calls,
            finish_reason,
        })
    }
}

/// Input of `toolbridge replay`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplayScript {
    pub session_id: String,
    pub turns: Vec<ReplayTurn>,
    /// Run a cleanup sweep with this max age (seconds) after the last turn.
    #[serde(default)]
    pub cleanup_after_secs: Option<u64>,
    /// End the session after the last turn.
    #[serde(default)]
    pub end_session: bool,
}

/// One scripted turn: the model's response, then what the executor reports.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplayTurn {
    #[serde(flatten)]
    pub response: TurnInput,
    /// Report a start for each admitted call before any result.
    #[serde(default = "default_true")]
    pub start: bool,
    #[serde(default)]
    pub results: Vec<ToolResultMessage>,
    #[serde(default)]
    pub failures: Vec<ScriptedFailure>,
    #[serde(default)]
    pub cancel: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptedFailure {
    pub call_id: String,
    pub error: String,
}

fn default_true() -> bool {
    true
}
