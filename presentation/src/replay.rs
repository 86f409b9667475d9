//! Scripted session replay for `toolbridge replay`.
//!
//! Each turn is admitted, then the scripted executor reports starts,
//! results, failures and cancellations in that order. Failures of
//! individual steps are recorded in the report and do not stop the replay.

use crate::input::{ReplayScript, ReplayTurn};
use serde::Serialize;
use std::time::Duration;
use toolbridge_application::{
    AdmissionOutcome, BridgeEngine, CleanupReport, EngineStats, SessionEndReport,
};
use toolbridge_domain::{
    BridgeError, CallId, CallState, LifecycleEntry, SessionId, SessionSnapshot, ToolChoice,
};
use tracing::debug;

/// One executor step and its effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub step: &'static str,
    pub call_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<CallState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepReport {
    fn new(step: &'static str, call_id: &str, result: Result<LifecycleEntry, BridgeError>) -> Self {
        let (state, error) = match result {
            Ok(entry) => (Some(entry.state), None),
            Err(e) => (None, Some(e.to_string())),
        };
        Self {
            step,
            call_id: call_id.to_string(),
            state,
            error,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TurnReport {
    /// Absent when the turn's input could not be read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<AdmissionOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_error: Option<String>,
    pub steps: Vec<StepReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub session_id: SessionId,
    pub turns: Vec<TurnReport>,
    /// Session state after the last turn, before cleanup.
    pub snapshot: Option<SessionSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleanup: Option<CleanupReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended: Option<SessionEndReport>,
    pub stats: EngineStats,
}

impl ReplayReport {
    pub fn failed_steps(&self) -> usize {
        self.turns
            .iter()
            .flat_map(|t| &t.steps)
            .filter(|s| s.error.is_some())
            .count()
    }
}

pub fn run_replay(engine: &BridgeEngine, script: ReplayScript) -> ReplayReport {
    let session = SessionId::new(script.session_id);
    let turns = script
        .turns
        .into_iter()
        .map(|turn| replay_turn(engine, &session, turn))
        .collect();

    let snapshot = engine.snapshot(&session);
    let cleanup = script
        .cleanup_after_secs
        .map(|secs| engine.cleanup(Duration::from_secs(secs)));
    let ended = script.end_session.then(|| engine.end_session(&session));

    ReplayReport {
        session_id: session,
        turns,
        snapshot,
        cleanup,
        ended,
        stats: engine.stats(),
    }
}

fn replay_turn(engine: &BridgeEngine, session: &SessionId, turn: ReplayTurn) -> TurnReport {
    let input_error = |message: String| TurnReport {
        outcome: None,
        input_error: Some(message),
        steps: Vec::new(),
    };

    let choice = match turn.response.choice() {
        Ok(choice) => choice.unwrap_or(ToolChoice::Auto),
        Err(e) => return input_error(e.to_string()),
    };
    let response = match turn.response.into_response(engine.id_source()) {
        Ok(response) => response,
        Err(e) => return input_error(e.to_string()),
    };

    let outcome = engine.admit_turn(session, &choice, response);
    let mut steps = Vec::new();

    if turn.start {
        for id in &outcome.admitted_ids {
            steps.push(StepReport::new("start", id.as_str(), engine.start_call(session, id)));
        }
    }
    for result in &turn.results {
        steps.push(StepReport::new(
            "result",
            &result.tool_call_id,
            engine.submit_result(result),
        ));
    }
    for failure in &turn.failures {
        let outcome = CallId::new(failure.call_id.as_str())
            .and_then(|id| engine.fail_call(session, &id, failure.error.as_str()));
        steps.push(StepReport::new("fail", &failure.call_id, outcome));
    }
    for raw in &turn.cancel {
        let outcome = CallId::new(raw.as_str()).and_then(|id| engine.cancel_call(session, &id));
        steps.push(StepReport::new("cancel", raw, outcome));
    }

    debug!(session = %session, steps = steps.len(), "Replayed turn");
    TurnReport {
        outcome: Some(outcome),
        input_error: None,
        steps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use toolbridge_application::{EngineParams, NoEventLogger, SystemClock};

    fn engine() -> BridgeEngine {
        BridgeEngine::new(
            EngineParams::default(),
            Arc::new(SystemClock),
            Arc::new(NoEventLogger),
        )
    }

    fn script(value: serde_json::Value) -> ReplayScript {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_replay_two_turns() {
        let engine = engine();
        let report = run_replay(
            &engine,
            script(json!({
                "session_id": "s1",
                "turns": [
                    {
                        "tool_calls": [
                            {"id": "w", "name": "write_file", "arguments": {"path": "a.txt"}},
                            {"id": "r", "name": "read_file", "arguments": {"path": "a.txt"}}
                        ],
                        "results": [
                            {"tool_call_id": "w", "content": "ok"},
                            {"tool_call_id": "r", "content": "data"}
                        ]
                    },
                    {
                        "tool_calls": [{"id": "x", "name": "run_command", "arguments": {"command": "make"}}],
                        "failures": [{"call_id": "x", "error": "exit 2"}]
                    }
                ]
            })),
        );

        assert_eq!(report.turns.len(), 2);
        assert_eq!(report.failed_steps(), 0);
        let snapshot = report.snapshot.unwrap();
        assert_eq!(snapshot.completed.len(), 3);
        assert!(snapshot.is_settled());
        assert_eq!(snapshot.counts.failed, 1);
        assert_eq!(report.stats.lifecycle.counts.completed, 2);
    }

    #[test]
    fn test_replay_records_step_errors() {
        let engine = engine();
        let report = run_replay(
            &engine,
            script(json!({
                "session_id": "s1",
                "turns": [{
                    "tool_calls": [{"id": "a", "name": "read_file"}],
                    "start": false,
                    "cancel": ["a"],
                    "results": [{"tool_call_id": "ghost", "content": "?"}]
                }],
                "cleanup_after_secs": 0,
                "end_session": true
            })),
        );

        let steps = &report.turns[0].steps;
        assert_eq!(steps[0].step, "result");
        assert!(steps[0].error.is_some());
        assert_eq!(steps[1].state, Some(CallState::Cancelled));
        assert_eq!(report.failed_steps(), 1);
        assert_eq!(report.cleanup.as_ref().unwrap().cleaned, 1);
        assert!(report.ended.is_some());
        assert!(engine.snapshot(&SessionId::new("s1")).is_none());
    }

    #[test]
    fn test_replay_bad_choice_is_input_error() {
        let engine = engine();
        let report = run_replay(
            &engine,
            script(json!({
                "session_id": "s1",
                "turns": [{"content": "hi", "tool_choice": {"type": "bogus"}}]
            })),
        );
        assert!(report.turns[0].outcome.is_none());
        assert!(report.turns[0].input_error.is_some());
        assert!(report.snapshot.is_none());
    }
}
