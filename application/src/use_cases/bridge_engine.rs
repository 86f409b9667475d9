//! Bridge engine: the end-to-end flow for one turn and its results.
//!
//! ```text
//! admit_turn:    enforce choice ─▶ coordinate ─▶ per call (in order):
//!                                                 track id ─▶ correlate ─▶ create entry
//! start_call:    pending ─▶ in_progress
//! submit_result: correlate result ─▶ (pending ─▶) in_progress ─▶ completed
//! fail_call:     (pending ─▶) in_progress ─▶ failed
//! cancel_call:   pending | in_progress ─▶ cancelled
//! ```
//!
//! Admission is all-or-nothing: if any call of a batch cannot be registered,
//! the calls already registered for that batch are rolled back. Composite
//! operations on one session are serialized by a per-session admission lock.
//! Events are written after that lock is released.

use super::coordinate_calls::Coordinator;
use super::correlate_results::CorrelationStore;
use super::drive_lifecycle::{
    CleanupReport, LifecycleStateMachine, LifecycleStats, TransitionDetails,
};
use super::enforce_choice::ChoiceEnforcer;
use super::shared::SessionScopes;
use super::track_ids::IdTracker;
use crate::config::EngineParams;
use crate::ports::clock::Clock;
use crate::ports::event_logger::{BridgeEvent, BridgeEventLogger, event_types};
use serde::{Serialize, Serializer};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use toolbridge_domain::{
    AssistantResponse, BridgeError, CallId, CallMetadata, CallState, ChoiceError, ChoiceVerdict,
    CoordinationIssue, CoordinationResult, CorrelationStats, IdSource, LifecycleEntry,
    OperationKind, RandomIdSource, SessionId, SessionSnapshot, ToolCallRequest, ToolChoice,
    ToolResultMessage,
};
use tracing::{debug, info, warn};

/// Why a turn was not admitted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdmissionFailure {
    #[error(transparent)]
    Choice(#[from] ChoiceError),

    #[error("Response rejected by tool choice {choice}")]
    Rejected { choice: String },

    #[error("Call batch failed coordination ({} issue(s))", .0.len())]
    Coordination(Vec<CoordinationIssue>),

    #[error("Call registration failed: {0}")]
    Registration(#[from] BridgeError),
}

/// Result of [`BridgeEngine::admit_turn`].
#[derive(Debug, Clone, Serialize)]
pub struct AdmissionOutcome {
    pub session_id: SessionId,
    pub admitted: bool,
    /// Absent only when enforcement itself failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<ChoiceVerdict>,
    /// Absent when the turn carried no calls or never reached coordination.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordination: Option<CoordinationResult>,
    /// The response to forward, possibly repaired.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<AssistantResponse>,
    /// Registered call ids, in execution order.
    pub admitted_ids: Vec<CallId>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_failure"
    )]
    pub failure: Option<AdmissionFailure>,
}

fn serialize_failure<S: Serializer>(
    failure: &Option<AdmissionFailure>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match failure {
        Some(f) => serializer.serialize_some(&f.to_string()),
        None => serializer.serialize_none(),
    }
}

impl AdmissionOutcome {
    fn new(session: &SessionId) -> Self {
        Self {
            session_id: session.clone(),
            admitted: false,
            verdict: None,
            coordination: None,
            response: None,
            admitted_ids: Vec::new(),
            failure: None,
        }
    }
}

/// What [`BridgeEngine::end_session`] removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionEndReport {
    pub entries: usize,
    pub correlations: usize,
    pub ids: usize,
}

/// Engine-wide counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    /// Sessions holding an admission scope.
    pub sessions: usize,
    pub tracked_ids: usize,
    pub correlations: CorrelationStats,
    pub lifecycle: LifecycleStats,
}

#[derive(Default)]
struct Registered {
    tracked: Vec<CallId>,
    correlated: Vec<CallId>,
    created: Vec<CallId>,
}

pub struct BridgeEngine {
    params: EngineParams,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdSource>,
    events: Arc<dyn BridgeEventLogger>,
    tracker: IdTracker,
    correlations: CorrelationStore,
    lifecycle: LifecycleStateMachine,
    coordinator: Coordinator,
    enforcer: ChoiceEnforcer,
    admission: SessionScopes<SessionId, ()>,
}

impl BridgeEngine {
    pub fn new(
        params: EngineParams,
        clock: Arc<dyn Clock>,
        events: Arc<dyn BridgeEventLogger>,
    ) -> Self {
        Self {
            tracker: IdTracker::new(
                clock.clone(),
                params.max_ids_per_session,
                params.tracker_budget,
            ),
            correlations: CorrelationStore::new(clock.clone(), params.correlation_budget),
            lifecycle: LifecycleStateMachine::new(clock.clone(), params.lifecycle_budget),
            coordinator: Coordinator::new(
                clock.clone(),
                params.max_parallel_calls,
                params.coordination_budget,
            ),
            enforcer: ChoiceEnforcer::new(
                clock.clone(),
                params.choice_timeout,
                params.fallback_text.clone(),
            ),
            admission: SessionScopes::new(),
            ids: Arc::new(RandomIdSource),
            params,
            clock,
            events,
        }
    }

    pub fn with_id_source(mut self, ids: Arc<dyn IdSource>) -> Self {
        self.ids = ids;
        self
    }

    // ==================== Accessors ====================

    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn id_source(&self) -> &dyn IdSource {
        self.ids.as_ref()
    }

    pub fn tracker(&self) -> &IdTracker {
        &self.tracker
    }

    pub fn correlations(&self) -> &CorrelationStore {
        &self.correlations
    }

    pub fn lifecycle(&self) -> &LifecycleStateMachine {
        &self.lifecycle
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn enforcer(&self) -> &ChoiceEnforcer {
        &self.enforcer
    }

    // ==================== Turn admission ====================

    /// Enforce `choice` on `response`, order its calls, and register each one.
    pub fn admit_turn(
        &self,
        session: &SessionId,
        choice: &ToolChoice,
        response: AssistantResponse,
    ) -> AdmissionOutcome {
        let mut outcome = AdmissionOutcome::new(session);

        let verdict = match self.enforcer.enforce_choice(choice, &response) {
            Ok(verdict) => verdict,
            Err(e) => return self.reject(outcome, e.into()),
        };
        let effective = verdict.effective(&response).cloned();
        outcome.verdict = Some(verdict);

        let Some(effective) = effective else {
            return self.reject(
                outcome,
                AdmissionFailure::Rejected {
                    choice: choice.to_string(),
                },
            );
        };

        if effective.has_tool_calls() {
            let coordination = self.coordinator.coordinate(&effective.tool_calls, Some(session));
            if !coordination.success {
                let errors = coordination.errors.clone();
                outcome.coordination = Some(coordination);
                return self.reject(outcome, AdmissionFailure::Coordination(errors));
            }

            if let Err(e) = self.register_batch(session, &effective.tool_calls, &coordination.order) {
                outcome.coordination = Some(coordination);
                return self.reject(outcome, e.into());
            }
            outcome.admitted_ids = coordination.order.clone();
            outcome.coordination = Some(coordination);
        }

        outcome.admitted = true;
        outcome.response = Some(effective);
        info!(
            session = %session,
            calls = outcome.admitted_ids.len(),
            "Turn admitted"
        );
        self.events.log(BridgeEvent::new(
            event_types::TURN_ADMITTED,
            json!({
                "session_id": session,
                "choice": choice.to_string(),
                "action": outcome.verdict.as_ref().map(|v| v.action),
                "order": outcome.admitted_ids,
                "layers": outcome.coordination.as_ref().map(|c| c.layers.len()).unwrap_or(0),
            }),
        ));
        outcome
    }

    fn reject(&self, mut outcome: AdmissionOutcome, failure: AdmissionFailure) -> AdmissionOutcome {
        warn!(session = %outcome.session_id, error = %failure, "Turn rejected");
        self.events.log(BridgeEvent::new(
            event_types::TURN_REJECTED,
            json!({
                "session_id": outcome.session_id,
                "error": failure.to_string(),
            }),
        ));
        outcome.failure = Some(failure);
        outcome
    }

    fn register_batch(
        &self,
        session: &SessionId,
        calls: &[ToolCallRequest],
        order: &[CallId],
    ) -> Result<(), BridgeError> {
        let by_id: HashMap<&CallId, &ToolCallRequest> = calls.iter().map(|c| (&c.id, c)).collect();

        let registered = self.admission.with(session, |_| {
            let mut done = Registered::default();
            for (position, id) in order.iter().enumerate() {
                let Some(request) = by_id.get(id) else {
                    continue;
                };
                if let Err(e) = self.register_call(session, request, position, &mut done) {
                    self.roll_back(session, &done);
                    return Err(e);
                }
            }
            Ok(())
        });
        if registered.is_err() {
            self.release_if_idle(session);
        }
        registered
    }

    fn register_call(
        &self,
        session: &SessionId,
        request: &ToolCallRequest,
        position: usize,
        done: &mut Registered,
    ) -> Result<(), BridgeError> {
        let id = self
            .tracker
            .track_id(request.id.as_str(), Some(session))
            .into_inner()?;
        done.tracked.push(id.clone());

        self.correlations
            .correlate_call(id.as_str(), Some(session))
            .into_inner()?;
        done.correlated.push(id.clone());

        let metadata = CallMetadata::new()
            .with("kind", OperationKind::classify(&request.name).as_str())
            .with("position", position);
        self.lifecycle
            .create_entry(session, request.clone(), Some(metadata))
            .into_inner()?;
        done.created.push(id);
        Ok(())
    }

    fn roll_back(&self, session: &SessionId, done: &Registered) {
        for id in &done.created {
            self.lifecycle.remove_entry(session, id);
        }
        for id in &done.correlated {
            self.correlations.forget(id);
        }
        for id in &done.tracked {
            let _ = self.tracker.untrack_id(id);
        }
        debug!(session = %session, rolled_back = done.tracked.len(), "Rolled back partial admission");
    }

    // ==================== Call progress ====================

    /// Mark a call as started by the executor.
    pub fn start_call(&self, session: &SessionId, id: &CallId) -> Result<LifecycleEntry, BridgeError> {
        let mut moved = Vec::new();
        let outcome = self.locked(session, || {
            self.drive(session, id, CallState::InProgress, TransitionDetails::default(), &mut moved)
        });
        self.log_transitions(session, &moved);
        outcome
    }

    /// Correlate a result and complete its call.
    ///
    /// A call whose start was never reported passes through `in_progress`
    /// first. Unknown ids fail with `CallNotFound` and are logged as orphans.
    /// A result for a call that can no longer complete is refused and its
    /// correlation stays pending.
    pub fn submit_result(&self, result: &ToolResultMessage) -> Result<LifecycleEntry, BridgeError> {
        let pending = match self.correlations.find_pending(&result.tool_call_id) {
            Ok(pending) => pending,
            Err(e) => return Err(self.orphan(result, e)),
        };
        let session = pending
            .session_id
            .ok_or(BridgeError::MissingField("session_id"))?;
        let id = pending.call_id;

        let mut moved = Vec::new();
        let outcome = self.locked(&session, || {
            // Another result may have completed it while we waited for the lock
            self.correlations.find_pending(&result.tool_call_id)?;
            let entry = self.entry(&session, &id)?;
            if entry.is_terminal() {
                return Err(BridgeError::InvalidTransition {
                    id: id.clone(),
                    from: entry.state,
                    to: CallState::Completed,
                });
            }

            let correlation = self.correlations.correlate_result(result).into_inner()?;
            self.ensure_started(&session, &id, &mut moved)?;
            let entry = self.drive(
                &session,
                &id,
                CallState::Completed,
                TransitionDetails::result(result.content.clone()),
                &mut moved,
            )?;
            Ok((correlation, entry))
        });
        self.log_transitions(&session, &moved);

        match outcome {
            Ok((correlation, entry)) => {
                self.events.log(BridgeEvent::new(
                    event_types::RESULT_CORRELATED,
                    json!({
                        "session_id": correlation.session_id,
                        "call_id": correlation.call_id,
                        "bytes": result.content.len(),
                    }),
                ));
                Ok(entry)
            }
            Err(e @ BridgeError::CallNotFound(_)) => Err(self.orphan(result, e)),
            Err(e) => Err(e),
        }
    }

    /// Record an execution failure for a call.
    pub fn fail_call(
        &self,
        session: &SessionId,
        id: &CallId,
        error: impl Into<String>,
    ) -> Result<LifecycleEntry, BridgeError> {
        let error = error.into();
        let mut moved = Vec::new();
        let outcome = self.locked(session, || {
            self.ensure_started(session, id, &mut moved)?;
            self.drive(session, id, CallState::Failed, TransitionDetails::error(error), &mut moved)
        });
        self.log_transitions(session, &moved);
        outcome
    }

    /// Cancel a call that has not reached a terminal state.
    pub fn cancel_call(&self, session: &SessionId, id: &CallId) -> Result<LifecycleEntry, BridgeError> {
        let mut moved = Vec::new();
        let outcome = self.locked(session, || {
            self.drive(session, id, CallState::Cancelled, TransitionDetails::default(), &mut moved)
        });
        self.log_transitions(session, &moved);
        outcome
    }

    /// Run `f` under the admission lock of a session that already has one.
    ///
    /// Sessions that never admitted a call fail with `SessionNotFound`
    /// and no scope is created for them.
    fn locked<R>(
        &self,
        session: &SessionId,
        f: impl FnOnce() -> Result<R, BridgeError>,
    ) -> Result<R, BridgeError> {
        self.admission
            .read(session, |_| f())
            .unwrap_or_else(|| Err(BridgeError::SessionNotFound(session.clone())))
    }

    fn entry(&self, session: &SessionId, id: &CallId) -> Result<LifecycleEntry, BridgeError> {
        self.lifecycle
            .get_entry(session, id)
            .ok_or_else(|| BridgeError::EntryNotFound {
                session: session.clone(),
                id: id.clone(),
            })
    }

    fn ensure_started(
        &self,
        session: &SessionId,
        id: &CallId,
        moved: &mut Vec<LifecycleEntry>,
    ) -> Result<(), BridgeError> {
        if self.entry(session, id)?.state == CallState::Pending {
            self.drive(session, id, CallState::InProgress, TransitionDetails::default(), moved)?;
        }
        Ok(())
    }

    /// Apply one transition, collecting the updated entry for logging.
    fn drive(
        &self,
        session: &SessionId,
        id: &CallId,
        next: CallState,
        details: TransitionDetails,
        moved: &mut Vec<LifecycleEntry>,
    ) -> Result<LifecycleEntry, BridgeError> {
        let entry = self
            .lifecycle
            .transition(session, id, next, details)
            .into_inner()?;
        moved.push(entry.clone());
        Ok(entry)
    }

    fn log_transitions(&self, session: &SessionId, moved: &[LifecycleEntry]) {
        for entry in moved {
            self.events.log(BridgeEvent::new(
                event_types::CALL_TRANSITIONED,
                json!({
                    "session_id": session,
                    "call_id": entry.id,
                    "state": entry.state,
                }),
            ));
        }
    }

    fn orphan(&self, result: &ToolResultMessage, error: BridgeError) -> BridgeError {
        self.events.log(BridgeEvent::new(
            event_types::ORPHAN_RESULT,
            json!({
                "tool_call_id": result.tool_call_id,
                "error": error.to_string(),
            }),
        ));
        error
    }

    // ==================== Queries ====================

    pub fn snapshot(&self, session: &SessionId) -> Option<SessionSnapshot> {
        self.lifecycle.snapshot(session)
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            sessions: self.admission.len(),
            tracked_ids: self.tracker.len(),
            correlations: self.correlations.get_stats(),
            lifecycle: self.lifecycle.stats(),
        }
    }

    // ==================== Reclamation ====================

    /// Sweep terminal entries older than `max_age`, releasing their ids and
    /// correlations too. Sessions left without entries lose their admission
    /// scope.
    pub fn cleanup(&self, max_age: Duration) -> CleanupReport {
        let report = self.lifecycle.cleanup(max_age);
        for id in &report.removed {
            self.correlations.forget(id);
            let _ = self.tracker.untrack_id(id);
        }
        for session in &report.removed_sessions {
            self.release_if_idle(session);
        }
        if report.cleaned > 0 {
            self.events.log(BridgeEvent::new(
                event_types::SESSIONS_CLEANED,
                json!({
                    "cleaned": report.cleaned,
                    "remaining": report.remaining,
                    "sessions_removed": report.sessions_removed,
                    "estimated_bytes_freed": report.estimated_bytes_freed,
                }),
            ));
        }
        report
    }

    /// [`cleanup`](Self::cleanup) with the configured retention.
    pub fn cleanup_expired(&self) -> CleanupReport {
        self.cleanup(self.params.retention)
    }

    /// Drop everything held for `session`.
    pub fn end_session(&self, session: &SessionId) -> SessionEndReport {
        let drop_all = || SessionEndReport {
            entries: self.lifecycle.drop_session(session).into_inner().len(),
            correlations: self.correlations.clear_session(session).into_inner(),
            ids: self.tracker.clear(Some(session)).into_inner(),
        };
        let report = self
            .admission
            .read(session, |_| drop_all())
            .unwrap_or_else(drop_all);
        self.admission.take(session);

        info!(
            session = %session,
            entries = report.entries,
            correlations = report.correlations,
            ids = report.ids,
            "Session ended"
        );
        self.events.log(BridgeEvent::new(
            event_types::SESSION_ENDED,
            json!({
                "session_id": session,
                "entries": report.entries,
                "correlations": report.correlations,
                "ids": report.ids,
            }),
        ));
        report
    }

    /// Drop the admission scope of a session with no lifecycle entries left.
    fn release_if_idle(&self, session: &SessionId) {
        self.admission
            .take_if(session, |_| self.lifecycle.snapshot(session).is_none());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::clock::ManualClock;
    use chrono::Utc;
    use crate::ports::clock::SystemClock;
    use parking_lot::Mutex;
    use serde_json::{Value, json};
    use std::sync::OnceLock;
    use std::sync::mpsc;
    use toolbridge_domain::{ChoiceAction, FinishReason};

    #[derive(Default)]
    struct RecordingLogger {
        events: Mutex<Vec<(&'static str, Value)>>,
    }

    impl RecordingLogger {
        fn types(&self) -> Vec<&'static str> {
            self.events.lock().iter().map(|(t, _)| *t).collect()
        }
    }

    impl BridgeEventLogger for RecordingLogger {
        fn log(&self, event: BridgeEvent) {
            self.events.lock().push((event.event_type, event.payload));
        }
    }

    /// Checks, while each event is written, whether another thread can take
    /// the session lock of that event.
    #[derive(Default)]
    struct LockCheckingLogger {
        engine: OnceLock<Arc<BridgeEngine>>,
        free: Mutex<Vec<&'static str>>,
        blocked: Mutex<Vec<&'static str>>,
    }

    impl BridgeEventLogger for LockCheckingLogger {
        fn log(&self, event: BridgeEvent) {
            let (Some(engine), Some(session)) =
                (self.engine.get(), event.payload["session_id"].as_str())
            else {
                return;
            };
            let engine = Arc::clone(engine);
            let session = SessionId::new(session);
            let (tx, rx) = mpsc::channel();
            std::thread::spawn(move || {
                // Unknown id: takes the lock, changes nothing, logs nothing
                let _ = engine.cancel_call(&session, &CallId::new("lock_check").unwrap());
                let _ = tx.send(());
            });
            let outcome = if rx.recv_timeout(Duration::from_secs(2)).is_ok() {
                &self.free
            } else {
                &self.blocked
            };
            outcome.lock().push(event.event_type);
        }
    }

    struct Harness {
        clock: Arc<ManualClock>,
        events: Arc<RecordingLogger>,
        engine: BridgeEngine,
    }

    fn harness(params: EngineParams) -> Harness {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let events = Arc::new(RecordingLogger::default());
        let engine = BridgeEngine::new(params, clock.clone(), events.clone());
        Harness {
            clock,
            events,
            engine,
        }
    }

    fn call(id: &str, name: &str, args: Value) -> ToolCallRequest {
        ToolCallRequest::with_json(CallId::new(id).unwrap(), name, &args)
    }

    fn id(s: &str) -> CallId {
        CallId::new(s).unwrap()
    }

    fn turn(calls: Vec<ToolCallRequest>) -> AssistantResponse {
        AssistantResponse::with_tool_calls(calls)
    }

    #[test]
    fn test_full_flow() {
        let h = harness(EngineParams::default());
        let s = SessionId::new("s1");
        let outcome = h.engine.admit_turn(
            &s,
            &ToolChoice::Auto,
            turn(vec![
                call("w", "write_file", json!({"path": "a.txt"})),
                call("r", "read_file", json!({"path": "a.txt"})),
            ]),
        );
        assert!(outcome.admitted, "{:?}", outcome.failure);
        assert_eq!(outcome.admitted_ids, vec![id("w"), id("r")]);
        assert_eq!(h.engine.tracker().len(), 2);

        let snap = h.engine.snapshot(&s).unwrap();
        assert_eq!(snap.pending.len(), 2);
        assert_eq!(snap.conversation_turn, 1);

        h.engine.start_call(&s, &id("w")).unwrap();
        let entry = h
            .engine
            .submit_result(&ToolResultMessage::new("w", "written"))
            .unwrap();
        assert_eq!(entry.state, CallState::Completed);

        // Result without a reported start passes through in_progress
        let entry = h
            .engine
            .submit_result(&ToolResultMessage::new("r", "contents"))
            .unwrap();
        assert_eq!(entry.state, CallState::Completed);
        assert_eq!(entry.result.as_deref(), Some("contents"));

        let snap = h.engine.snapshot(&s).unwrap();
        assert!(snap.is_settled());
        assert_eq!(snap.conversation_turn, 2);

        let stats = h.engine.stats();
        assert_eq!(stats.correlations.completed, 2);
        assert_eq!(stats.lifecycle.counts.completed, 2);

        let types = h.events.types();
        assert_eq!(types[0], event_types::TURN_ADMITTED);
        assert!(types.contains(&event_types::RESULT_CORRELATED));
        assert!(types.contains(&event_types::CALL_TRANSITIONED));
    }

    #[test]
    fn test_entry_metadata_records_kind_and_position() {
        let h = harness(EngineParams::default());
        let s = SessionId::new("s1");
        h.engine.admit_turn(
            &s,
            &ToolChoice::Auto,
            turn(vec![
                call("x", "run_command", json!({"command": "ls"})),
                call("r", "read_file", json!({"path": "a"})),
            ]),
        );
        let entry = h.engine.lifecycle().get_entry(&s, &id("x")).unwrap();
        assert_eq!(entry.metadata.get("kind"), Some(&json!("execute")));
        assert_eq!(entry.metadata.get("position"), Some(&json!(1)));
    }

    #[test]
    fn test_capacity_failure_rolls_back_whole_batch() {
        let h = harness(EngineParams::default().with_max_ids_per_session(2));
        let s = SessionId::new("s1");
        let outcome = h.engine.admit_turn(
            &s,
            &ToolChoice::Auto,
            turn(vec![
                call("a", "read_file", json!({"path": "1"})),
                call("b", "read_file", json!({"path": "2"})),
                call("c", "read_file", json!({"path": "3"})),
            ]),
        );
        assert!(!outcome.admitted);
        assert!(matches!(
            outcome.failure,
            Some(AdmissionFailure::Registration(BridgeError::SessionCapacityExceeded { .. }))
        ));
        assert!(outcome.admitted_ids.is_empty());
        assert!(h.engine.tracker().is_empty());
        assert!(h.engine.correlations().is_empty());
        assert!(h.engine.snapshot(&s).map(|snap| snap.is_empty()).unwrap_or(true));
        assert_eq!(h.events.types(), vec![event_types::TURN_REJECTED]);
    }

    #[test]
    fn test_duplicate_across_turns_rolls_back() {
        let h = harness(EngineParams::default());
        let s = SessionId::new("s1");
        assert!(
            h.engine
                .admit_turn(&s, &ToolChoice::Auto, turn(vec![call("c1", "read_file", json!({}))]))
                .admitted
        );

        let outcome = h.engine.admit_turn(
            &s,
            &ToolChoice::Auto,
            turn(vec![
                call("c2", "read_file", json!({"path": "x"})),
                call("c1", "grep_search", json!({"pattern": "y"})),
            ]),
        );
        assert!(!outcome.admitted);
        assert!(matches!(
            outcome.failure,
            Some(AdmissionFailure::Registration(BridgeError::DuplicateId(_)))
        ));
        assert!(!h.engine.tracker().is_tracked(&id("c2")));
        assert_eq!(h.engine.snapshot(&s).unwrap().total, 1);
    }

    #[test]
    fn test_choice_none_admits_text_only() {
        let h = harness(EngineParams::default());
        let s = SessionId::new("s1");
        let outcome = h.engine.admit_turn(
            &s,
            &ToolChoice::None,
            turn(vec![call("a", "read_file", json!({})), call("b", "bash", json!({}))]),
        );
        assert!(outcome.admitted);
        assert_eq!(outcome.verdict.as_ref().unwrap().action, ChoiceAction::ForceTextOnly);
        let response = outcome.response.unwrap();
        assert!(response.tool_calls.is_empty());
        assert_eq!(response.text(), h.engine.params().fallback_text);
        assert_eq!(response.finish_reason, Some(FinishReason::Stop));
        assert!(outcome.admitted_ids.is_empty());
        assert!(h.engine.tracker().is_empty());
        assert!(h.engine.snapshot(&s).is_none());
    }

    #[test]
    fn test_forced_function_filters_before_registration() {
        let h = harness(EngineParams::default());
        let s = SessionId::new("s1");
        let outcome = h.engine.admit_turn(
            &s,
            &ToolChoice::Function("read_file".to_string()),
            turn(vec![
                call("a", "read_file", json!({"path": "x"})),
                call("b", "bash", json!({"command": "rm"})),
            ]),
        );
        assert!(outcome.admitted);
        assert_eq!(outcome.admitted_ids, vec![id("a")]);
        assert!(!h.engine.tracker().is_tracked(&id("b")));
    }

    #[test]
    fn test_rejected_turn_registers_nothing() {
        let h = harness(EngineParams::default());
        let s = SessionId::new("s1");
        let outcome = h.engine.admit_turn(
            &s,
            &ToolChoice::Function("X".to_string()),
            turn(vec![call("a", "Y", json!({}))]),
        );
        assert!(!outcome.admitted);
        assert!(matches!(outcome.failure, Some(AdmissionFailure::Rejected { .. })));
        assert!(outcome.response.is_none());
        assert!(h.engine.tracker().is_empty());
    }

    #[test]
    fn test_choice_timeout_rejects_turn() {
        let h = harness(EngineParams::default().with_choice_timeout(Duration::from_millis(1)));
        h.clock.set_auto_step(Duration::from_millis(5));
        let outcome = h.engine.admit_turn(
            &SessionId::new("s1"),
            &ToolChoice::Auto,
            turn(vec![call("a", "read_file", json!({}))]),
        );
        assert!(!outcome.admitted);
        assert!(outcome.verdict.is_none());
        assert!(matches!(
            outcome.failure,
            Some(AdmissionFailure::Choice(ChoiceError::ProcessingTimeout { .. }))
        ));
    }

    #[test]
    fn test_oversized_batch_fails_coordination() {
        let h = harness(EngineParams::default().with_max_parallel_calls(1));
        let outcome = h.engine.admit_turn(
            &SessionId::new("s1"),
            &ToolChoice::Auto,
            turn(vec![call("a", "read_file", json!({})), call("b", "read_file", json!({}))]),
        );
        assert!(!outcome.admitted);
        assert!(matches!(outcome.failure, Some(AdmissionFailure::Coordination(ref e)) if e.len() == 1));
        assert!(!outcome.coordination.unwrap().success);
    }

    #[test]
    fn test_orphan_result_is_logged() {
        let h = harness(EngineParams::default());
        let err = h
            .engine
            .submit_result(&ToolResultMessage::new("ghost", "?"))
            .unwrap_err();
        assert_eq!(err, BridgeError::CallNotFound("ghost".to_string()));
        assert_eq!(h.events.types(), vec![event_types::ORPHAN_RESULT]);
    }

    #[test]
    fn test_result_after_cancel_is_refused() {
        let h = harness(EngineParams::default());
        let s = SessionId::new("s1");
        h.engine
            .admit_turn(&s, &ToolChoice::Auto, turn(vec![call("a", "read_file", json!({}))]));
        h.engine.cancel_call(&s, &id("a")).unwrap();

        let err = h
            .engine
            .submit_result(&ToolResultMessage::new("a", "late"))
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidTransition { .. }));
        assert_eq!(
            h.engine.lifecycle().get_entry(&s, &id("a")).unwrap().state,
            CallState::Cancelled
        );
    }

    #[test]
    fn test_refused_result_leaves_correlation_pending() {
        let h = harness(EngineParams::default());
        let s = SessionId::new("s1");
        h.engine
            .admit_turn(&s, &ToolChoice::Auto, turn(vec![call("a", "read_file", json!({}))]));
        h.engine.cancel_call(&s, &id("a")).unwrap();

        for _ in 0..2 {
            let err = h
                .engine
                .submit_result(&ToolResultMessage::new("a", "late"))
                .unwrap_err();
            assert_eq!(
                err,
                BridgeError::InvalidTransition {
                    id: id("a"),
                    from: CallState::Cancelled,
                    to: CallState::Completed,
                }
            );
        }
        let correlation = h.engine.correlations().get(&id("a")).unwrap();
        assert!(correlation.is_pending());
        assert!(correlation.completed_at.is_none());
        assert_eq!(h.engine.stats().correlations.completed, 0);
        assert!(!h.events.types().contains(&event_types::RESULT_CORRELATED));
    }

    #[test]
    fn test_second_result_is_an_orphan() {
        let h = harness(EngineParams::default());
        let s = SessionId::new("s1");
        h.engine
            .admit_turn(&s, &ToolChoice::Auto, turn(vec![call("a", "read_file", json!({}))]));
        h.engine
            .submit_result(&ToolResultMessage::new("a", "first"))
            .unwrap();

        let err = h
            .engine
            .submit_result(&ToolResultMessage::new("a", "second"))
            .unwrap_err();
        assert_eq!(err, BridgeError::CallNotFound("a".to_string()));
        let entry = h.engine.lifecycle().get_entry(&s, &id("a")).unwrap();
        assert_eq!(entry.result.as_deref(), Some("first"));
        assert_eq!(h.events.types().last(), Some(&event_types::ORPHAN_RESULT));
    }

    #[test]
    fn test_progress_on_unknown_session_creates_nothing() {
        let h = harness(EngineParams::default());
        let s = SessionId::new("never-admitted");
        assert_eq!(
            h.engine.start_call(&s, &id("a")).unwrap_err(),
            BridgeError::SessionNotFound(s.clone())
        );
        assert!(matches!(
            h.engine.fail_call(&s, &id("a"), "boom"),
            Err(BridgeError::SessionNotFound(_))
        ));
        assert!(matches!(
            h.engine.cancel_call(&s, &id("a")),
            Err(BridgeError::SessionNotFound(_))
        ));
        assert_eq!(h.engine.stats().sessions, 0);
        assert!(h.events.types().is_empty());
    }

    #[test]
    fn test_fail_call_from_pending() {
        let h = harness(EngineParams::default());
        let s = SessionId::new("s1");
        h.engine
            .admit_turn(&s, &ToolChoice::Auto, turn(vec![call("a", "web_fetch", json!({}))]));
        let entry = h.engine.fail_call(&s, &id("a"), "connection refused").unwrap();
        assert_eq!(entry.state, CallState::Failed);
        assert_eq!(entry.error.as_deref(), Some("connection refused"));
        assert!(entry.completed_at.is_some());
    }

    #[test]
    fn test_cleanup_releases_ids_and_correlations() {
        let h = harness(EngineParams::default().with_retention(Duration::from_secs(60)));
        let s = SessionId::new("s1");
        h.engine.admit_turn(
            &s,
            &ToolChoice::Auto,
            turn(vec![call("a", "read_file", json!({})), call("b", "read_file", json!({"path": "b"}))]),
        );
        h.engine
            .submit_result(&ToolResultMessage::new("a", "done"))
            .unwrap();

        h.clock.advance(Duration::from_secs(30));
        assert_eq!(h.engine.cleanup_expired().cleaned, 0);

        h.clock.advance(Duration::from_secs(31));
        let report = h.engine.cleanup_expired();
        assert_eq!(report.removed, vec![id("a")]);
        assert_eq!(report.remaining, 1);
        assert!(!h.engine.tracker().is_tracked(&id("a")));
        assert!(h.engine.correlations().get(&id("a")).is_none());
        assert!(h.engine.tracker().is_tracked(&id("b")));
        assert!(h.events.types().contains(&event_types::SESSIONS_CLEANED));
    }

    #[test]
    fn test_cleanup_zero_empties_settled_session() {
        let h = harness(EngineParams::default());
        let s = SessionId::new("s1");
        h.engine
            .admit_turn(&s, &ToolChoice::Auto, turn(vec![call("a", "read_file", json!({}))]));
        h.engine.cancel_call(&s, &id("a")).unwrap();

        let report = h.engine.cleanup(Duration::ZERO);
        assert_eq!(report.cleaned, 1);
        assert_eq!(report.sessions_removed, 1);
        assert_eq!(report.removed_sessions, vec![s.clone()]);
        assert!(h.engine.snapshot(&s).is_none());
        assert!(h.engine.tracker().is_empty());
        assert_eq!(h.engine.stats().sessions, 0);
    }

    #[test]
    fn test_cleanup_reclaims_session_scopes() {
        let h = harness(EngineParams::default());
        for n in 0..100 {
            let s = SessionId::new(format!("s{n}"));
            let call_id = format!("c{n}");
            let outcome = h.engine.admit_turn(
                &s,
                &ToolChoice::Auto,
                turn(vec![call(&call_id, "read_file", json!({}))]),
            );
            assert!(outcome.admitted);
            h.engine.cancel_call(&s, &id(&call_id)).unwrap();

            // A duplicate from another session is refused without leaving scopes
            let visitor = SessionId::new(format!("visitor{n}"));
            let outcome = h.engine.admit_turn(
                &visitor,
                &ToolChoice::Auto,
                turn(vec![call(&call_id, "read_file", json!({}))]),
            );
            assert!(!outcome.admitted);
            assert!(h.engine.start_call(&visitor, &id(&call_id)).is_err());
        }
        assert_eq!(h.engine.stats().sessions, 100);
        assert_eq!(h.engine.tracker().session_count(), 100);
        assert_eq!(h.engine.correlations().session_count(), 100);

        let report = h.engine.cleanup(Duration::ZERO);
        assert_eq!(report.cleaned, 100);
        assert_eq!(report.removed_sessions.len(), 100);
        assert_eq!(h.engine.stats().sessions, 0);
        assert_eq!(h.engine.tracker().session_count(), 0);
        assert_eq!(h.engine.correlations().session_count(), 0);
        assert!(h.engine.tracker().is_empty());
        assert!(h.engine.correlations().is_empty());
    }

    #[test]
    fn test_events_are_written_outside_session_lock() {
        let logger = Arc::new(LockCheckingLogger::default());
        let engine = Arc::new(BridgeEngine::new(
            EngineParams::default(),
            Arc::new(SystemClock),
            logger.clone(),
        ));
        let _ = logger.engine.set(Arc::clone(&engine));

        let s = SessionId::new("s1");
        let outcome = engine.admit_turn(
            &s,
            &ToolChoice::Auto,
            turn(vec![
                call("a", "read_file", json!({"path": "a"})),
                call("b", "read_file", json!({"path": "b"})),
                call("c", "read_file", json!({"path": "c"})),
            ]),
        );
        assert!(outcome.admitted);
        engine.start_call(&s, &id("a")).unwrap();
        engine
            .submit_result(&ToolResultMessage::new("a", "ok"))
            .unwrap();
        engine.fail_call(&s, &id("b"), "boom").unwrap();
        engine.cancel_call(&s, &id("c")).unwrap();

        assert!(logger.blocked.lock().is_empty(), "{:?}", logger.blocked.lock());
        let free = logger.free.lock();
        assert!(free.contains(&event_types::TURN_ADMITTED));
        assert!(free.contains(&event_types::RESULT_CORRELATED));
        // a: start, complete; b: start, fail; c: cancel
        assert_eq!(
            free.iter()
                .filter(|t| **t == event_types::CALL_TRANSITIONED)
                .count(),
            5
        );
    }

    #[test]
    fn test_end_session() {
        let h = harness(EngineParams::default());
        let s1 = SessionId::new("s1");
        let s2 = SessionId::new("s2");
        h.engine.admit_turn(
            &s1,
            &ToolChoice::Auto,
            turn(vec![call("a", "read_file", json!({})), call("b", "read_file", json!({"path": "q"}))]),
        );
        h.engine
            .admit_turn(&s2, &ToolChoice::Auto, turn(vec![call("c", "read_file", json!({}))]));

        let report = h.engine.end_session(&s1);
        assert_eq!(
            report,
            SessionEndReport {
                entries: 2,
                correlations: 2,
                ids: 2
            }
        );
        assert!(h.engine.snapshot(&s1).is_none());
        assert!(h.engine.snapshot(&s2).is_some());
        assert_eq!(h.engine.tracker().len(), 1);

        // The session can start over with the same ids
        assert!(
            h.engine
                .admit_turn(&s1, &ToolChoice::Auto, turn(vec![call("a", "read_file", json!({}))]))
                .admitted
        );
    }

    #[test]
    fn test_outcome_serializes_failure_as_message() {
        let h = harness(EngineParams::default());
        let outcome = h.engine.admit_turn(
            &SessionId::new("s1"),
            &ToolChoice::Required,
            AssistantResponse::from_text("no calls"),
        );
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["admitted"], false);
        assert_eq!(json["failure"], "Response rejected by tool choice required");
        assert_eq!(json["verdict"]["action"], "rejectResponse");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sessions_are_independent() {
        let engine = Arc::new(BridgeEngine::new(
            EngineParams::default(),
            Arc::new(crate::ports::clock::SystemClock),
            Arc::new(crate::ports::event_logger::NoEventLogger),
        ));

        let mut handles = Vec::new();
        for n in 0..16 {
            let engine = Arc::clone(&engine);
            handles.push(tokio::spawn(async move {
                let s = SessionId::new(format!("session-{n}"));
                let calls = (0..4)
                    .map(|i| call(&format!("s{n}_c{i}"), "read_file", json!({"path": format!("{i}")})))
                    .collect();
                let outcome = engine.admit_turn(&s, &ToolChoice::Auto, turn(calls));
                assert!(outcome.admitted);
                for i in 0..4 {
                    engine
                        .submit_result(&ToolResultMessage::new(format!("s{n}_c{i}"), "ok"))
                        .unwrap();
                }
                engine.snapshot(&s).unwrap()
            }));
        }

        for h in handles {
            let snap = h.await.unwrap();
            assert!(snap.is_settled());
            assert_eq!(snap.completed.len(), 4);
        }
        assert_eq!(engine.tracker().len(), 64);
        assert_eq!(engine.stats().lifecycle.sessions, 16);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_admission_same_session_is_atomic() {
        let engine = Arc::new(BridgeEngine::new(
            EngineParams::default().with_max_ids_per_session(6),
            Arc::new(crate::ports::clock::SystemClock),
            Arc::new(crate::ports::event_logger::NoEventLogger),
        ));
        let s = SessionId::new("shared");

        let mut handles = Vec::new();
        for n in 0..8 {
            let engine = Arc::clone(&engine);
            let s = s.clone();
            handles.push(tokio::spawn(async move {
                let calls = (0..3)
                    .map(|i| call(&format!("t{n}_c{i}"), "read_file", json!({"path": format!("{n}/{i}")})))
                    .collect();
                engine.admit_turn(&s, &ToolChoice::Auto, turn(calls)).admitted
            }));
        }

        let mut admitted = 0;
        for h in handles {
            if h.await.unwrap() {
                admitted += 1;
            }
        }
        // Two batches of three fill the session; no batch is half-admitted
        assert_eq!(admitted, 2);
        assert_eq!(engine.tracker().get_ids_for_session(Some(&s)).len(), 6);
        assert_eq!(engine.snapshot(&s).unwrap().total, 6);
        assert_eq!(engine.correlations().len(), 6);
    }
}
