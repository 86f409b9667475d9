//! Call lifecycle states and the transition table.
//!
//! # State Transitions
//!
//! ```text
//! Pending ──> InProgress ──> Completed
//!    │             ├──────> Failed
//!    │             └──────> Cancelled
//!    └──────────────────────> Cancelled
//! ```
//!
//! `Pending` is the unique initial state. `Completed`, `Failed` and
//! `Cancelled` are terminal: they have no outgoing edges, so every path
//! through the table is monotonic.

use serde::{Deserialize, Serialize};

/// Lifecycle state of one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl CallState {
    pub const ALL: [CallState; 5] = [
        CallState::Pending,
        CallState::InProgress,
        CallState::Completed,
        CallState::Failed,
        CallState::Cancelled,
    ];

    /// States reachable in one step from `self`.
    pub fn successors(&self) -> &'static [CallState] {
        match self {
            CallState::Pending => &[CallState::InProgress, CallState::Cancelled],
            CallState::InProgress => &[
                CallState::Completed,
                CallState::Failed,
                CallState::Cancelled,
            ],
            CallState::Completed | CallState::Failed | CallState::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: CallState) -> bool {
        self.successors().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CallState::Completed | CallState::Failed | CallState::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallState::Pending => "pending",
            CallState::InProgress => "in_progress",
            CallState::Completed => "completed",
            CallState::Failed => "failed",
            CallState::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for CallState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CallState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(CallState::Pending),
            "in_progress" | "in-progress" | "running" => Ok(CallState::InProgress),
            "completed" | "complete" => Ok(CallState::Completed),
            "failed" | "error" => Ok(CallState::Failed),
            "cancelled" | "canceled" => Ok(CallState::Cancelled),
            other => Err(format!("unknown call state: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_edges() {
        assert!(CallState::Pending.can_transition_to(CallState::InProgress));
        assert!(CallState::Pending.can_transition_to(CallState::Cancelled));
        assert!(CallState::InProgress.can_transition_to(CallState::Completed));
        assert!(CallState::InProgress.can_transition_to(CallState::Failed));
        assert!(CallState::InProgress.can_transition_to(CallState::Cancelled));
    }

    #[test]
    fn test_pending_cannot_skip_in_progress() {
        assert!(!CallState::Pending.can_transition_to(CallState::Completed));
        assert!(!CallState::Pending.can_transition_to(CallState::Failed));
    }

    #[test]
    fn test_no_self_loops_or_backward_edges() {
        for state in CallState::ALL {
            assert!(!state.can_transition_to(state), "{state} loops");
            assert!(!state.can_transition_to(CallState::Pending));
        }
        assert!(!CallState::InProgress.can_transition_to(CallState::Pending));
    }

    #[test]
    fn test_terminals_have_no_successors() {
        for state in CallState::ALL {
            assert_eq!(state.is_terminal(), state.successors().is_empty());
        }
    }

    #[test]
    fn test_parse_and_display() {
        for state in CallState::ALL {
            assert_eq!(state.as_str().parse::<CallState>(), Ok(state));
        }
        assert_eq!("canceled".parse::<CallState>(), Ok(CallState::Cancelled));
        assert!("done".parse::<CallState>().is_err());
    }
}
