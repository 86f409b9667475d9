//! Correlation store: links issued call ids to their eventual results.
//!
//! Results arrive tagged only by call id, so the store keeps a global
//! id-to-session index next to the per-session correlation tables. Every
//! mutation is measured against the correlation budget.

use super::shared::{ScopeKey, SessionScopes};
use crate::ports::clock::{Clock, measure};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use toolbridge_domain::{
    BridgeError, CallId, Correlation, CorrelationStats, CorrelationStatus, Measured, SessionId,
    ToolResultMessage,
};
use tracing::{debug, warn};

pub struct CorrelationStore {
    clock: Arc<dyn Clock>,
    budget: Duration,
    index: DashMap<CallId, ScopeKey>,
    scopes: SessionScopes<ScopeKey, HashMap<CallId, Correlation>>,
}

impl CorrelationStore {
    pub fn new(clock: Arc<dyn Clock>, budget: Duration) -> Self {
        Self {
            clock,
            budget,
            index: DashMap::new(),
            scopes: SessionScopes::new(),
        }
    }

    /// Create a pending correlation for `id`.
    pub fn correlate_call(
        &self,
        id: &str,
        session: Option<&SessionId>,
    ) -> Measured<Result<Correlation, BridgeError>> {
        let measured = measure(self.clock.as_ref(), self.budget, |now| -> Result<_, BridgeError> {
            let id = CallId::new(id)?;
            let key: ScopeKey = session.cloned();

            let created = self.scopes.with(&key, |table| {
                match self.index.entry(id.clone()) {
                    Entry::Occupied(_) => return Err(BridgeError::DuplicateCorrelation(id.clone())),
                    Entry::Vacant(slot) => {
                        slot.insert(key.clone());
                    }
                }
                let correlation = Correlation::new(id.clone(), key.clone(), now);
                table.insert(id, correlation.clone());
                Ok(correlation)
            });
            if created.is_err() {
                self.scopes.take_if(&key, HashMap::is_empty);
            }
            created
        });
        self.note_budget("correlate_call", &measured);
        measured
    }

    /// Complete the pending correlation named by `result.tool_call_id`.
    ///
    /// Unknown, malformed and already-completed ids are all orphan results
    /// and fail with `CallNotFound`.
    pub fn correlate_result(
        &self,
        result: &ToolResultMessage,
    ) -> Measured<Result<Correlation, BridgeError>> {
        let measured = measure(self.clock.as_ref(), self.budget, |now| -> Result<_, BridgeError> {
            let raw = result.tool_call_id.as_str();
            let not_found = || BridgeError::CallNotFound(raw.to_string());
            let (id, key) = self.locate(raw).ok_or_else(not_found)?;

            self.scopes
                .read(&key, |table| -> Result<Correlation, BridgeError> {
                    let correlation = table.get_mut(&id).ok_or_else(not_found)?;
                    correlation.complete(now)?;
                    Ok(correlation.clone())
                })
                .unwrap_or_else(|| Err(not_found()))
        });

        match &measured.outcome {
            Ok(c) => debug!(call_id = %c.call_id, "Correlated result"),
            Err(e) => warn!(tool_call_id = %result.tool_call_id, error = %e, "Orphan result"),
        }
        self.note_budget("correlate_result", &measured);
        measured
    }

    /// The pending correlation a result tagged `raw_id` would complete.
    ///
    /// Fails with `CallNotFound` exactly when [`correlate_result`] would,
    /// without changing anything.
    ///
    /// [`correlate_result`]: Self::correlate_result
    pub fn find_pending(&self, raw_id: &str) -> Result<Correlation, BridgeError> {
        let not_found = || BridgeError::CallNotFound(raw_id.to_string());
        let (id, key) = self.locate(raw_id).ok_or_else(not_found)?;
        self.scopes
            .read(&key, |table| table.get(&id).filter(|c| c.is_pending()).cloned())
            .flatten()
            .ok_or_else(not_found)
    }

    fn locate(&self, raw_id: &str) -> Option<(CallId, ScopeKey)> {
        let id = CallId::new(raw_id).ok()?;
        let key = self.index.get(&id).map(|k| k.value().clone())?;
        Some((id, key))
    }

    pub fn get(&self, id: &CallId) -> Option<Correlation> {
        let key = self.index.get(id).map(|k| k.value().clone())?;
        self.scopes
            .read(&key, |table| table.get(id).cloned())
            .flatten()
    }

    /// Counts by status across all sessions.
    pub fn get_stats(&self) -> CorrelationStats {
        let mut stats = CorrelationStats::default();
        for key in self.scopes.keys() {
            let counted = self.scopes.read(&key, |table| {
                let pending = table
                    .values()
                    .filter(|c| c.status == CorrelationStatus::Pending)
                    .count();
                (pending, table.len() - pending)
            });
            if let Some((pending, completed)) = counted {
                stats.pending += pending;
                stats.completed += completed;
                if key.is_some() && pending + completed > 0 {
                    stats.sessions += 1;
                }
            }
        }
        stats.total = stats.pending + stats.completed;
        stats
    }

    /// Remove every correlation of `session`. Returns the removed count.
    pub fn clear_session(&self, session: &SessionId) -> Measured<usize> {
        let measured = measure(self.clock.as_ref(), self.budget, |_| {
            let Some(table) = self.scopes.take(&Some(session.clone())) else {
                return 0;
            };
            for id in table.keys() {
                self.index.remove(id);
            }
            debug!(session = %session, removed = table.len(), "Cleared session correlations");
            table.len()
        });
        self.note_budget("clear_session", &measured);
        measured
    }

    /// Remove the correlation for one id, whatever its status.
    ///
    /// The session table goes too once its last correlation is removed.
    pub fn forget(&self, id: &CallId) -> Measured<bool> {
        let measured = measure(self.clock.as_ref(), self.budget, |_| {
            let Some(key) = self.index.get(id).map(|k| k.value().clone()) else {
                return false;
            };
            let removed = self
                .scopes
                .read(&key, |table| {
                    let removed = table.remove(id).is_some();
                    if removed {
                        self.index.remove(id);
                    }
                    removed
                })
                .unwrap_or(false);
            if removed {
                self.scopes.take_if(&key, HashMap::is_empty);
            }
            removed
        });
        self.note_budget("forget", &measured);
        measured
    }

    /// Number of session tables currently held.
    pub fn session_count(&self) -> usize {
        self.scopes.len()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    fn note_budget<T>(&self, operation: &'static str, measured: &Measured<T>) {
        if measured.over_budget() {
            warn!(
                operation,
                elapsed_ms = measured.timing.elapsed_ms(),
                budget_ms = measured.timing.budget_ms(),
                "Correlation store operation over budget"
            );
        }
    }
}
