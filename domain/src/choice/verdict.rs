//! Choice verdict types.

use crate::call::{AssistantResponse, CallId};
use crate::core::timing::Timing;
use crate::core::validation::Severity;
use serde::{Deserialize, Serialize};

/// What the enforcer did with the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChoiceAction {
    /// Response forwarded as produced.
    None,
    /// Tool calls stripped; text-only response with a plain stop marker.
    ForceTextOnly,
    /// Call set already matched the forced function; completion marker fixed.
    ForceFunction,
    /// Calls to other functions removed.
    FilterTools,
    /// Unrepairable; the response must not be forwarded.
    RejectResponse,
}

impl ChoiceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChoiceAction::None => "none",
            ChoiceAction::ForceTextOnly => "forceTextOnly",
            ChoiceAction::ForceFunction => "forceFunction",
            ChoiceAction::FilterTools => "filterTools",
            ChoiceAction::RejectResponse => "rejectResponse",
        }
    }
}

impl std::fmt::Display for ChoiceAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    UnexpectedToolCalls,
    MissingForcedFunction,
    UnexpectedFunction,
    FinishReasonMismatch,
    MissingToolCall,
}

impl ViolationKind {
    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            ViolationKind::UnexpectedToolCalls => "unexpected tool calls",
            ViolationKind::MissingForcedFunction => "missing forced function",
            ViolationKind::UnexpectedFunction => "unexpected function",
            ViolationKind::FinishReasonMismatch => "finish reason mismatch",
            ViolationKind::MissingToolCall => "missing tool call",
        }
    }
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One way the response departs from the directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceViolation {
    pub kind: ViolationKind,
    pub severity: Severity,
    pub message: String,
    /// Calls involved, if any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub call_ids: Vec<CallId>,
}

impl ChoiceViolation {
    pub fn error(kind: ViolationKind, message: impl Into<String>, call_ids: Vec<CallId>) -> Self {
        Self {
            kind,
            severity: Severity::Error,
            message: message.into(),
            call_ids,
        }
    }

    pub fn warning(kind: ViolationKind, message: impl Into<String>, call_ids: Vec<CallId>) -> Self {
        Self {
            kind,
            severity: Severity::Warning,
            message: message.into(),
            call_ids,
        }
    }
}

/// Result of enforcing a directive against one response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceVerdict {
    /// False only when the response is rejected.
    pub success: bool,
    /// Whether the response satisfied the directive as produced.
    pub compliant: bool,
    pub action: ChoiceAction,
    pub violations: Vec<ChoiceViolation>,
    /// The modified response, present whenever a repair was made.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repaired: Option<AssistantResponse>,
    /// Set by the enforcer once processing time is known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<Timing>,
}

impl ChoiceVerdict {
    pub fn compliant() -> Self {
        Self {
            success: true,
            compliant: true,
            action: ChoiceAction::None,
            violations: Vec::new(),
            repaired: None,
            timing: None,
        }
    }

    pub fn repaired(
        action: ChoiceAction,
        violations: Vec<ChoiceViolation>,
        response: AssistantResponse,
    ) -> Self {
        Self {
            success: true,
            compliant: false,
            action,
            violations,
            repaired: Some(response),
            timing: None,
        }
    }

    pub fn rejected(violations: Vec<ChoiceViolation>) -> Self {
        Self {
            success: false,
            compliant: false,
            action: ChoiceAction::RejectResponse,
            violations,
            repaired: None,
            timing: None,
        }
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = Some(timing);
        self
    }

    pub fn has_violation(&self, kind: ViolationKind) -> bool {
        self.violations.iter().any(|v| v.kind == kind)
    }

    pub fn error_count(&self) -> usize {
        self.violations
            .iter()
            .filter(|v| v.severity == Severity::Error)
            .count()
    }

    /// The response to forward: the repaired one if any, else the original.
    /// `None` when the verdict is a rejection.
    pub fn effective<'a>(&'a self, original: &'a AssistantResponse) -> Option<&'a AssistantResponse> {
        if !self.success {
            return None;
        }
        Some(self.repaired.as_ref().unwrap_or(original))
    }
}
