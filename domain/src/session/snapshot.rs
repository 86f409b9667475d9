//! Derived per-session aggregate.

use super::id::SessionId;
use crate::call::CallId;
use crate::lifecycle::{CallState, LifecycleEntry};
use serde::{Deserialize, Serialize};

/// Number of entries in each lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StateCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl StateCounts {
    pub fn record(&mut self, state: CallState) {
        match state {
            CallState::Pending => self.pending += 1,
            CallState::InProgress => self.in_progress += 1,
            CallState::Completed => self.completed += 1,
            CallState::Failed => self.failed += 1,
            CallState::Cancelled => self.cancelled += 1,
        }
    }

    pub fn add(&mut self, other: &StateCounts) {
        self.pending += other.pending;
        self.in_progress += other.in_progress;
        self.completed += other.completed;
        self.failed += other.failed;
        self.cancelled += other.cancelled;
    }

    pub fn terminal(&self) -> usize {
        self.completed + self.failed + self.cancelled
    }

    pub fn active(&self) -> usize {
        self.pending + self.in_progress
    }

    pub fn total(&self) -> usize {
        self.terminal() + self.active()
    }
}

/// Aggregate view of one session, recomputed after every mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    /// Non-terminal calls (`pending` or `in_progress`), in creation order.
    pub pending: Vec<CallId>,
    /// Terminal calls, in creation order.
    pub completed: Vec<CallId>,
    pub total: usize,
    /// Terminal calls, plus one while any call is still outstanding.
    pub conversation_turn: usize,
    pub counts: StateCounts,
}

impl SessionSnapshot {
    /// Compute a snapshot from entries already in creation order.
    pub fn compute<'a>(
        session_id: &SessionId,
        entries: impl IntoIterator<Item = &'a LifecycleEntry>,
    ) -> Self {
        let mut pending = Vec::new();
        let mut completed = Vec::new();
        let mut counts = StateCounts::default();

        for entry in entries {
            counts.record(entry.state);
            if entry.is_terminal() {
                completed.push(entry.id.clone());
            } else {
                pending.push(entry.id.clone());
            }
        }

        let conversation_turn = completed.len() + usize::from(!pending.is_empty());

        Self {
            session_id: session_id.clone(),
            total: pending.len() + completed.len(),
            pending,
            completed,
            conversation_turn,
            counts,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Whether every call in the session has reached a terminal state.
    pub fn is_settled(&self) -> bool {
        self.pending.is_empty()
    }
}
