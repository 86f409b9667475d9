//! Id tracker: registered call ids, globally and per session.
//!
//! Mutations are measured against the tracker budget. A session scope that
//! ends up empty, whether after a refused registration or after its last id
//! is untracked, is removed again.

use super::shared::{ScopeKey, SessionScopes};
use crate::ports::clock::{Clock, measure};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use toolbridge_domain::{BridgeError, CallId, Measured, SessionId};
use tracing::{debug, warn};

#[derive(Default)]
struct TrackedIds {
    /// Registration order.
    order: Vec<CallId>,
    members: HashSet<CallId>,
}

impl TrackedIds {
    fn remove(&mut self, id: &CallId) -> bool {
        if self.members.remove(id) {
            self.order.retain(|o| o != id);
            true
        } else {
            false
        }
    }

    fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Set of call ids registered with this engine instance.
///
/// An id is registered at most once across all sessions. Sessions are
/// capped at `max_per_session` ids; sessionless ids are uncapped.
pub struct IdTracker {
    clock: Arc<dyn Clock>,
    budget: Duration,
    max_per_session: usize,
    /// Global membership: id to the scope holding it.
    global: DashMap<CallId, ScopeKey>,
    scopes: SessionScopes<ScopeKey, TrackedIds>,
}

impl IdTracker {
    pub fn new(clock: Arc<dyn Clock>, max_per_session: usize, budget: Duration) -> Self {
        Self {
            clock,
            budget,
            max_per_session,
            global: DashMap::new(),
            scopes: SessionScopes::new(),
        }
    }

    /// Register `id`, optionally within a session.
    ///
    /// Fails with `InvalidId` when the format check fails, `DuplicateId` when
    /// already registered anywhere, and `SessionCapacityExceeded` when the
    /// session is full. A failed call leaves the tracker unchanged.
    pub fn track_id(
        &self,
        id: &str,
        session: Option<&SessionId>,
    ) -> Measured<Result<CallId, BridgeError>> {
        let measured = measure(self.clock.as_ref(), self.budget, |_| -> Result<_, BridgeError> {
            let id = CallId::new(id)?;
            let key: ScopeKey = session.cloned();

            let tracked = self.scopes.with(&key, |tracked| {
                if let Some(session) = session
                    && tracked.members.len() >= self.max_per_session
                {
                    return Err(BridgeError::SessionCapacityExceeded {
                        session: session.clone(),
                        max: self.max_per_session,
                    });
                }

                match self.global.entry(id.clone()) {
                    Entry::Occupied(_) => return Err(BridgeError::DuplicateId(id.clone())),
                    Entry::Vacant(slot) => {
                        slot.insert(key.clone());
                    }
                }

                tracked.members.insert(id.clone());
                tracked.order.push(id.clone());
                debug!(call_id = %id, session = ?key, "Tracked call id");
                Ok(id)
            });
            if tracked.is_err() {
                self.scopes.take_if(&key, TrackedIds::is_empty);
            }
            tracked
        });
        self.note_budget("track_id", &measured);
        measured
    }

    /// Unregister `id`. Fails with `NotTracked` if absent.
    pub fn untrack_id(&self, id: &CallId) -> Measured<Result<(), BridgeError>> {
        let measured = measure(self.clock.as_ref(), self.budget, |_| -> Result<(), BridgeError> {
            let key = self
                .global
                .get(id)
                .map(|k| k.value().clone())
                .ok_or_else(|| BridgeError::NotTracked(id.clone()))?;

            let removed = self
                .scopes
                .read(&key, |tracked| {
                    let removed = tracked.remove(id);
                    if removed {
                        self.global.remove(id);
                    }
                    removed
                })
                .unwrap_or(false);

            if !removed {
                return Err(BridgeError::NotTracked(id.clone()));
            }
            self.scopes.take_if(&key, TrackedIds::is_empty);
            debug!(call_id = %id, "Untracked call id");
            Ok(())
        });
        self.note_budget("untrack_id", &measured);
        measured
    }

    /// Ids registered in `session` (or the sessionless scope), in registration order.
    pub fn get_ids_for_session(&self, session: Option<&SessionId>) -> Vec<CallId> {
        self.scopes
            .read(&session.cloned(), |tracked| tracked.order.clone())
            .unwrap_or_default()
    }

    pub fn is_tracked(&self, id: &CallId) -> bool {
        self.global.contains_key(id)
    }

    /// Drop one session's ids, or every id when `session` is `None`.
    ///
    /// Returns the number of ids removed.
    pub fn clear(&self, session: Option<&SessionId>) -> Measured<usize> {
        let measured = measure(self.clock.as_ref(), self.budget, |_| match session {
            Some(session) => self.clear_scope(&Some(session.clone())),
            None => self
                .scopes
                .keys()
                .iter()
                .map(|key| self.clear_scope(key))
                .sum(),
        });
        self.note_budget("clear", &measured);
        measured
    }

    fn clear_scope(&self, key: &ScopeKey) -> usize {
        let Some(tracked) = self.scopes.take(key) else {
            return 0;
        };
        for id in &tracked.order {
            self.global.remove(id);
        }
        tracked.order.len()
    }

    /// Total ids tracked across all sessions.
    pub fn len(&self) -> usize {
        self.global.len()
    }

    pub fn is_empty(&self) -> bool {
        self.global.is_empty()
    }

    /// Number of scopes currently holding ids.
    pub fn session_count(&self) -> usize {
        self.scopes.len()
    }

    fn note_budget<T>(&self, operation: &'static str, measured: &Measured<T>) {
        if measured.over_budget() {
            warn!(
                operation,
                elapsed_ms = measured.timing.elapsed_ms(),
                budget_ms = measured.timing.budget_ms(),
                "Id tracker operation over budget"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::clock::ManualClock;

    fn tracker(max_per_session: usize) -> IdTracker {
        IdTracker::new(
            Arc::new(ManualClock::default()),
            max_per_session,
            Duration::from_millis(5),
        )
    }

    fn session(s: &str) -> SessionId {
        SessionId::new(s)
    }

    fn track(tracker: &IdTracker, id: &str, s: Option<&SessionId>) -> Result<CallId, BridgeError> {
        tracker.track_id(id, s).into_inner()
    }

    #[test]
    fn test_track_and_untrack() {
        let tracker = tracker(8);
        let s = session("s1");
        let id = track(&tracker, "call_1", Some(&s)).unwrap();
        assert!(tracker.is_tracked(&id));
        assert_eq!(tracker.get_ids_for_session(Some(&s)), vec![id.clone()]);

        tracker.untrack_id(&id).into_inner().unwrap();
        assert!(!tracker.is_tracked(&id));
        assert!(tracker.get_ids_for_session(Some(&s)).is_empty());
        assert_eq!(
            tracker.untrack_id(&id).into_inner().unwrap_err(),
            BridgeError::NotTracked(id)
        );
    }

    #[test]
    fn test_duplicate_leaves_size_unchanged() {
        let tracker = tracker(8);
        track(&tracker, "dup", None).unwrap();
        let before = tracker.len();

        let err = track(&tracker, "dup", None).unwrap_err();
        assert_eq!(err, BridgeError::DuplicateId(CallId::new("dup").unwrap()));
        assert_eq!(tracker.len(), before);

        // Unique across sessions, not just within one
        let err = track(&tracker, "dup", Some(&session("other"))).unwrap_err();
        assert!(matches!(err, BridgeError::DuplicateId(_)));
        assert!(tracker.get_ids_for_session(Some(&session("other"))).is_empty());
    }

    #[test]
    fn test_refused_registration_leaves_no_scope() {
        let tracker = tracker(8);
        track(&tracker, "dup", Some(&session("owner"))).unwrap();
        for n in 0..10 {
            let s = session(&format!("visitor-{n}"));
            assert!(track(&tracker, "dup", Some(&s)).is_err());
        }
        assert_eq!(tracker.session_count(), 1);
    }

    #[test]
    fn test_untracking_last_id_removes_scope() {
        let tracker = tracker(8);
        let s = session("s1");
        let a = track(&tracker, "a", Some(&s)).unwrap();
        let b = track(&tracker, "b", Some(&s)).unwrap();

        tracker.untrack_id(&a).into_inner().unwrap();
        assert_eq!(tracker.session_count(), 1);
        tracker.untrack_id(&b).into_inner().unwrap();
        assert_eq!(tracker.session_count(), 0);

        // The session can register again
        track(&tracker, "a", Some(&s)).unwrap();
        assert_eq!(tracker.get_ids_for_session(Some(&s)), vec![a]);
    }

    #[test]
    fn test_invalid_id() {
        let tracker = tracker(8);
        let err = track(&tracker, "not valid!", None).unwrap_err();
        assert_eq!(err, BridgeError::InvalidId("not valid!".to_string()));
        assert!(tracker.is_empty());
        assert_eq!(tracker.session_count(), 0);
    }

    #[test]
    fn test_session_capacity() {
        let tracker = tracker(2);
        let s = session("s1");
        track(&tracker, "a", Some(&s)).unwrap();
        track(&tracker, "b", Some(&s)).unwrap();
        let err = track(&tracker, "c", Some(&s)).unwrap_err();
        assert_eq!(
            err,
            BridgeError::SessionCapacityExceeded {
                session: s.clone(),
                max: 2
            }
        );
        assert!(!tracker.is_tracked(&CallId::new("c").unwrap()));
        // A full session keeps its ids
        assert_eq!(tracker.get_ids_for_session(Some(&s)).len(), 2);

        // Other sessions and the sessionless scope are unaffected
        track(&tracker, "c", Some(&session("s2"))).unwrap();
        for i in 0..5 {
            track(&tracker, &format!("free_{i}"), None).unwrap();
        }
    }

    #[test]
    fn test_clear_one_and_all() {
        let tracker = tracker(8);
        let s1 = session("s1");
        let s2 = session("s2");
        track(&tracker, "a", Some(&s1)).unwrap();
        track(&tracker, "b", Some(&s1)).unwrap();
        track(&tracker, "c", Some(&s2)).unwrap();
        track(&tracker, "d", None).unwrap();

        assert_eq!(tracker.clear(Some(&s1)).into_inner(), 2);
        assert_eq!(tracker.len(), 2);
        assert!(tracker.get_ids_for_session(Some(&s1)).is_empty());

        // a cleared id can be tracked again
        track(&tracker, "a", Some(&s2)).unwrap();

        assert_eq!(tracker.clear(None).into_inner(), 3);
        assert!(tracker.is_empty());
        assert_eq!(tracker.session_count(), 0);
    }

    #[test]
    fn test_ids_keep_registration_order() {
        let tracker = tracker(8);
        let s = session("s");
        for id in ["z", "a", "m"] {
            track(&tracker, id, Some(&s)).unwrap();
        }
        let ids: Vec<String> = tracker
            .get_ids_for_session(Some(&s))
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(ids, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_mutations_report_timing() {
        let clock = Arc::new(ManualClock::default().with_auto_step(Duration::from_millis(10)));
        let tracker = IdTracker::new(clock, 8, Duration::from_millis(5));

        let measured = tracker.track_id("slow", None);
        assert!(measured.over_budget());
        let id = measured.into_inner().unwrap();

        let measured = tracker.untrack_id(&id);
        assert!(measured.over_budget());
        assert!(measured.outcome.is_ok());

        let measured = tracker.clear(None);
        assert_eq!(measured.timing.budget_ms(), 5);
        assert_eq!(measured.outcome, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_admission_respects_capacity() {
        let tracker = Arc::new(tracker(10));
        let s = session("shared");

        let mut handles = Vec::new();
        for i in 0..50 {
            let tracker = Arc::clone(&tracker);
            let s = s.clone();
            handles.push(tokio::spawn(async move {
                track(&tracker, &format!("id_{}", i % 25), Some(&s)).is_ok()
            }));
        }

        let mut accepted = 0;
        for h in handles {
            if h.await.unwrap() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 10);
        assert_eq!(tracker.get_ids_for_session(Some(&s)).len(), 10);
        assert_eq!(tracker.len(), 10);
    }
}
