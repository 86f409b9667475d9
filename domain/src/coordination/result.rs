//! Coordination outcome types.

use crate::call::CallId;
use crate::core::timing::Timing;
use crate::core::validation::Severity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Dependency map: call id to the ids it must wait for.
pub type DependencyMap = BTreeMap<CallId, Vec<CallId>>;

/// Stable machine-readable diagnostic codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticCode {
    /// A dependency cycle was broken by forcing one call ahead.
    CycleBroken,
    /// A call's arguments were not a JSON object, so no resources were inferred.
    UnparsedArguments,
    /// A dependency hint named an id that is not in the batch.
    UnknownHintTarget,
    /// A dependency hint pointed a call at itself.
    SelfDependencyHint,
    /// Coordination ran past its soft budget.
    OverBudget,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::CycleBroken => "cycle_broken",
            DiagnosticCode::UnparsedArguments => "unparsed_arguments",
            DiagnosticCode::UnknownHintTarget => "unknown_hint_target",
            DiagnosticCode::SelfDependencyHint => "self_dependency_hint",
            DiagnosticCode::OverBudget => "over_budget",
        }
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-fatal observation made while ordering a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub call_ids: Vec<CallId>,
}

impl Diagnostic {
    pub fn warning(code: DiagnosticCode, message: impl Into<String>, call_ids: Vec<CallId>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
            call_ids,
        }
    }
}

/// Input problems that make a batch unorderable. All of them are reported
/// together rather than stopping at the first.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum CoordinationIssue {
    #[error("Batch contains no calls")]
    EmptyBatch,

    #[error("Batch has {count} calls, more than the limit of {max}")]
    TooManyCalls { count: usize, max: usize },

    #[error("Invalid call id at position {index}: {id:?}")]
    InvalidId { index: usize, id: String },

    #[error("Duplicate call id in batch: {id}")]
    DuplicateId { id: CallId },
}

/// Ordered plan for one batch of calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinationResult {
    pub success: bool,
    /// Execution order: a permutation of the batch ids. Empty on failure.
    pub order: Vec<CallId>,
    /// Calls that can run together, layer by layer. Concatenated, the layers
    /// equal `order`.
    pub layers: Vec<Vec<CallId>>,
    /// Every call id mapped to the ids it depends on (possibly none).
    pub dependencies: DependencyMap,
    pub diagnostics: Vec<Diagnostic>,
    pub errors: Vec<CoordinationIssue>,
    pub timing: Timing,
}

impl CoordinationResult {
    pub fn failed(errors: Vec<CoordinationIssue>, timing: Timing) -> Self {
        Self {
            success: false,
            order: Vec::new(),
            layers: Vec::new(),
            dependencies: DependencyMap::new(),
            diagnostics: Vec::new(),
            errors,
            timing,
        }
    }

    /// Whether the named diagnostic was emitted.
    pub fn has_diagnostic(&self, code: DiagnosticCode) -> bool {
        self.diagnostics.iter().any(|d| d.code == code)
    }

    /// Position of `id` in the execution order.
    pub fn position(&self, id: &CallId) -> Option<usize> {
        self.order.iter().position(|o| o == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_issue_messages() {
        assert_eq!(CoordinationIssue::EmptyBatch.to_string(), "Batch contains no calls");
        assert_eq!(
            CoordinationIssue::TooManyCalls { count: 40, max: 32 }.to_string(),
            "Batch has 40 calls, more than the limit of 32"
        );
        let issue = CoordinationIssue::InvalidId {
            index: 2,
            id: "bad id".to_string(),
        };
        assert_eq!(issue.to_string(), "Invalid call id at position 2: \"bad id\"");
    }

    #[test]
    fn test_issue_serializes_with_code_tag() {
        let json = serde_json::to_value(CoordinationIssue::TooManyCalls { count: 3, max: 2 }).unwrap();
        assert_eq!(json["code"], "too_many_calls");
        assert_eq!(json["count"], 3);
    }

    #[test]
    fn test_failed_result_is_empty() {
        let timing = Timing::new(Duration::from_micros(10), Duration::from_millis(10));
        let result = CoordinationResult::failed(vec![CoordinationIssue::EmptyBatch], timing);
        assert!(!result.success);
        assert!(result.order.is_empty());
        assert!(result.layers.is_empty());
        assert_eq!(result.errors.len(), 1);
        assert!(!result.has_diagnostic(DiagnosticCode::CycleBroken));
    }
}
