//! Lifecycle state machine: per-session entry tables and transitions.
//!
//! Each session owns an arena of [`LifecycleEntry`] values in creation order
//! plus an id index into it. Entries are only ever changed through
//! [`LifecycleStateMachine::transition`] and only ever removed by an explicit
//! [`cleanup`](LifecycleStateMachine::cleanup) or session drop.

use super::shared::SessionScopes;
use crate::ports::clock::{Clock, measure};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use toolbridge_domain::{
    BridgeError, CallId, CallMetadata, CallState, LifecycleEntry, Measured, SessionId,
    SessionSnapshot, StateCounts, Timing, ToolCallRequest,
};
use tracing::{debug, info, warn};

#[derive(Default)]
struct SessionEntries {
    entries: Vec<LifecycleEntry>,
    index: HashMap<CallId, usize>,
}

impl SessionEntries {
    fn get_mut(&mut self, id: &CallId) -> Option<&mut LifecycleEntry> {
        let i = *self.index.get(id)?;
        self.entries.get_mut(i)
    }

    fn reindex(&mut self) {
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id.clone(), i))
            .collect();
    }
}

/// Optional payload of a transition.
#[derive(Debug, Clone, Default)]
pub struct TransitionDetails {
    pub result: Option<String>,
    pub error: Option<String>,
    pub metadata: Option<CallMetadata>,
}

impl TransitionDetails {
    pub fn result(content: impl Into<String>) -> Self {
        Self {
            result: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn with_metadata(mut self, metadata: CallMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Outcome of a cleanup sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub cleaned: usize,
    pub remaining: usize,
    pub sessions_removed: usize,
    pub estimated_bytes_freed: usize,
    /// Ids of the removed entries.
    pub removed: Vec<CallId>,
    /// Sessions dropped because the sweep left them empty.
    pub removed_sessions: Vec<SessionId>,
    pub timing: Timing,
}

/// Entry counts across all sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LifecycleStats {
    pub sessions: usize,
    pub counts: StateCounts,
}

pub struct LifecycleStateMachine {
    clock: Arc<dyn Clock>,
    budget: Duration,
    sessions: SessionScopes<SessionId, SessionEntries>,
}

impl LifecycleStateMachine {
    pub fn new(clock: Arc<dyn Clock>, budget: Duration) -> Self {
        Self {
            clock,
            budget,
            sessions: SessionScopes::new(),
        }
    }

    /// Create a `pending` entry for `request` in `session`.
    pub fn create_entry(
        &self,
        session: &SessionId,
        request: ToolCallRequest,
        metadata: Option<CallMetadata>,
    ) -> Measured<Result<LifecycleEntry, BridgeError>> {
        let measured = measure(self.clock.as_ref(), self.budget, |now| {
            if session.is_blank() {
                return Err(BridgeError::MissingField("session_id"));
            }
            self.sessions.with(session, |table| {
                if table.index.contains_key(&request.id) {
                    return Err(BridgeError::DuplicateEntry {
                        session: session.clone(),
                        id: request.id.clone(),
                    });
                }
                let entry = LifecycleEntry::new(request, metadata.unwrap_or_default(), now);
                table.index.insert(entry.id.clone(), table.entries.len());
                table.entries.push(entry.clone());
                debug!(session = %session, call_id = %entry.id, "Created lifecycle entry");
                Ok(entry)
            })
        });
        self.note_budget("create_entry", &measured);
        measured
    }

    /// Move entry `id` of `session` to `next`.
    ///
    /// Fails with `SessionNotFound`/`EntryNotFound` for unknown targets and
    /// `InvalidTransition` for edges outside the table; a failed transition
    /// changes nothing.
    pub fn transition(
        &self,
        session: &SessionId,
        id: &CallId,
        next: CallState,
        details: TransitionDetails,
    ) -> Measured<Result<LifecycleEntry, BridgeError>> {
        let measured = measure(self.clock.as_ref(), self.budget, |now| {
            self.sessions
                .read(session, |table| -> Result<LifecycleEntry, BridgeError> {
                    let entry = table.get_mut(id).ok_or_else(|| BridgeError::EntryNotFound {
                        session: session.clone(),
                        id: id.clone(),
                    })?;
                    let from = entry.state;
                    entry.apply(next, details.result, details.error, details.metadata, now)?;
                    debug!(session = %session, call_id = %id, %from, to = %next, "Lifecycle transition");
                    Ok(entry.clone())
                })
                .unwrap_or_else(|| Err(BridgeError::SessionNotFound(session.clone())))
        });
        if let Err(e) = &measured.outcome {
            debug!(session = %session, call_id = %id, error = %e, "Transition refused");
        }
        self.note_budget("transition", &measured);
        measured
    }

    pub fn get_entry(&self, session: &SessionId, id: &CallId) -> Option<LifecycleEntry> {
        self.sessions
            .read(session, |table| table.get_mut(id).map(|e| e.clone()))
            .flatten()
    }

    /// Entries of `session` in any of `states`, in creation order.
    /// An empty `states` slice matches every entry.
    pub fn list_by_state(&self, session: &SessionId, states: &[CallState]) -> Vec<LifecycleEntry> {
        self.sessions
            .read(session, |table| {
                table
                    .entries
                    .iter()
                    .filter(|e| states.is_empty() || states.contains(&e.state))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Aggregate view of `session`; `None` when the session is absent.
    pub fn snapshot(&self, session: &SessionId) -> Option<SessionSnapshot> {
        self.sessions
            .read(session, |table| SessionSnapshot::compute(session, &table.entries))
    }

    /// Remove a single entry regardless of state. Used to roll back a
    /// partially admitted batch.
    /// A session left without entries is dropped.
    pub fn remove_entry(&self, session: &SessionId, id: &CallId) -> Measured<Option<LifecycleEntry>> {
        let measured = measure(self.clock.as_ref(), self.budget, |_| {
            let removed = self
                .sessions
                .read(session, |table| -> Option<LifecycleEntry> {
                    let i = table.index.remove(id)?;
                    let entry = table.entries.remove(i);
                    table.reindex();
                    Some(entry)
                })
                .flatten();
            if removed.is_some() {
                self.sessions.take_if(session, |table| table.entries.is_empty());
            }
            removed
        });
        self.note_budget("remove_entry", &measured);
        measured
    }

    /// Sweep terminal entries settled at least `max_age` ago and drop
    /// sessions left empty. Nothing else ever removes entries on a timer.
    pub fn cleanup(&self, max_age: Duration) -> CleanupReport {
        let max_age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);

        let measured = measure(self.clock.as_ref(), self.budget, |now| {
            let mut report = CleanupReport::default();
            let sessions_removed = self.sessions.sweep(|session, table| {
                let (expired, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut table.entries)
                    .into_iter()
                    .partition(|e| e.is_terminal() && now - e.settled_at() >= max_age);

                for entry in &expired {
                    report.estimated_bytes_freed += entry.estimated_bytes();
                    report.removed.push(entry.id.clone());
                }
                report.cleaned += expired.len();
                report.remaining += kept.len();

                table.entries = kept;
                table.reindex();
                let emptied = table.entries.is_empty();
                if emptied {
                    report.removed_sessions.push(session.clone());
                }
                emptied
            });
            report.sessions_removed = sessions_removed;
            report
        });
        self.note_budget("cleanup", &measured);
        let mut report = measured.outcome;
        report.timing = measured.timing;

        if report.cleaned > 0 || report.sessions_removed > 0 {
            info!(
                cleaned = report.cleaned,
                remaining = report.remaining,
                sessions_removed = report.sessions_removed,
                bytes_freed = report.estimated_bytes_freed,
                "Lifecycle cleanup"
            );
        }
        report
    }

    /// Remove a session and all its entries. Returns the removed entries.
    pub fn drop_session(&self, session: &SessionId) -> Measured<Vec<LifecycleEntry>> {
        let measured = measure(self.clock.as_ref(), self.budget, |_| {
            self.sessions
                .take(session)
                .map(|table| table.entries)
                .unwrap_or_default()
        });
        self.note_budget("drop_session", &measured);
        measured
    }

    pub fn stats(&self) -> LifecycleStats {
        let mut stats = LifecycleStats::default();
        for key in self.sessions.keys() {
            let counted = self.sessions.read(&key, |table| {
                let mut counts = StateCounts::default();
                for entry in &table.entries {
                    counts.record(entry.state);
                }
                counts
            });
            if let Some(counts) = counted {
                stats.sessions += 1;
                stats.counts.add(&counts);
            }
        }
        stats
    }

    fn note_budget<T>(&self, operation: &'static str, measured: &Measured<T>) {
        if measured.over_budget() {
            warn!(
                operation,
                elapsed_ms = measured.timing.elapsed_ms(),
                budget_ms = measured.timing.budget_ms(),
                "Lifecycle operation over budget"
            );
        }
    }
}
