//! Candidate assistant responses.
//!
//! A turn producer's output, as seen by the choice enforcer: optional text,
//! a batch of tool calls, and the completion marker the bridge will report.
//!
//! ```text
//! Turn producer ─▶ AssistantResponse ─▶ ChoiceEnforcer ─▶ (repaired) AssistantResponse
//! ```

use super::entities::ToolCallRequest;
use serde::{Deserialize, Serialize};

/// Why the model stopped generating, in function-calling protocol terms.
///
/// Serialized as the bare marker string; unrecognised markers are kept as
/// [`FinishReason::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FinishReason {
    /// Natural end of the turn (plain stop).
    Stop,
    /// The turn ends with tool calls for the client to run.
    ToolCalls,
    /// Hit the token limit; the response may be truncated.
    Length,
    /// Provider-specific reason.
    Other(String),
}

impl FinishReason {
    pub fn as_str(&self) -> &str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::ToolCalls => "tool_calls",
            FinishReason::Length => "length",
            FinishReason::Other(s) => s,
        }
    }
}

impl From<String> for FinishReason {
    fn from(marker: String) -> Self {
        match marker.as_str() {
            "stop" => FinishReason::Stop,
            "tool_calls" => FinishReason::ToolCalls,
            "length" => FinishReason::Length,
            _ => FinishReason::Other(marker),
        }
    }
}

impl From<FinishReason> for String {
    fn from(reason: FinishReason) -> Self {
        match reason {
            FinishReason::Other(marker) => marker,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A response produced for one turn.
///
/// # Examples
///
/// ```
/// use toolbridge_domain::{AssistantResponse, CallId, FinishReason, ToolCallRequest};
///
/// let response = AssistantResponse::from_text("Hello!");
/// assert!(!response.has_tool_calls());
/// assert_eq!(response.finish_reason, Some(FinishReason::Stop));
///
/// let response = AssistantResponse::with_tool_calls(vec![ToolCallRequest::new(
///     CallId::new("call_1").unwrap(),
///     "read_file",
///     r#"{"path":"README.md"}"#,
/// )]);
/// assert_eq!(response.called_functions(), vec!["read_file"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AssistantResponse {
    /// Text content, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Proposed tool calls, in the order the model produced them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    /// Completion marker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

impl AssistantResponse {
    /// Create a text-only response with a plain stop marker.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            tool_calls: Vec::new(),
            finish_reason: Some(FinishReason::Stop),
        }
    }

    /// Create a response carrying only tool calls.
    pub fn with_tool_calls(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            content: None,
            tool_calls,
            finish_reason: Some(FinishReason::ToolCalls),
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Text content, or `""` when absent.
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }

    /// Whether the response carries non-whitespace text.
    pub fn has_text(&self) -> bool {
        !self.text().trim().is_empty()
    }

    /// Function names of all tool calls, in order (duplicates kept).
    pub fn called_functions(&self) -> Vec<&str> {
        self.tool_calls.iter().map(|c| c.name.as_str()).collect()
    }

    /// Whether any tool call targets `name`.
    pub fn calls_function(&self, name: &str) -> bool {
        self.tool_calls.iter().any(|c| c.name == name)
    }
}
