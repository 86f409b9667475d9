//! Coordination domain module
//!
//! Pure ordering logic for one batch of calls: resource inference,
//! dependency edges and the layered schedule. Input validation and budget
//! measurement wrap this in the application layer.

pub mod graph;
pub mod resources;
pub mod result;

pub use graph::{CallNode, DependencyGraph, Schedule};
pub use resources::CallResources;
pub use result::{CoordinationIssue, CoordinationResult, DependencyMap, Diagnostic, DiagnosticCode};

use crate::call::ToolCallRequest;
use std::collections::HashSet;

/// Collect every input problem in a batch.
///
/// An empty batch and an oversized batch are reported alongside duplicate
/// ids; nothing short-circuits.
pub fn validate_batch(calls: &[ToolCallRequest], max_calls: usize) -> Vec<CoordinationIssue> {
    let mut issues = Vec::new();
    if calls.is_empty() {
        issues.push(CoordinationIssue::EmptyBatch);
    }
    if calls.len() > max_calls {
        issues.push(CoordinationIssue::TooManyCalls {
            count: calls.len(),
            max: max_calls,
        });
    }

    let mut seen = HashSet::with_capacity(calls.len());
    let mut reported = HashSet::new();
    for call in calls {
        if !seen.insert(&call.id) && reported.insert(&call.id) {
            issues.push(CoordinationIssue::DuplicateId {
                id: call.id.clone(),
            });
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::CallId;

    fn call(id: &str) -> ToolCallRequest {
        ToolCallRequest::new(CallId::new(id).unwrap(), "read_file", "{}")
    }

    #[test]
    fn test_validate_empty() {
        assert_eq!(validate_batch(&[], 32), vec![CoordinationIssue::EmptyBatch]);
    }

    #[test]
    fn test_validate_collects_all_issues() {
        let calls = vec![call("a"), call("a"), call("b"), call("a")];
        let issues = validate_batch(&calls, 3);
        assert_eq!(
            issues,
            vec![
                CoordinationIssue::TooManyCalls { count: 4, max: 3 },
                CoordinationIssue::DuplicateId {
                    id: CallId::new("a").unwrap()
                },
            ]
        );
    }

    #[test]
    fn test_validate_at_limit_is_ok() {
        let calls = vec![call("a"), call("b")];
        assert!(validate_batch(&calls, 2).is_empty());
    }
}
