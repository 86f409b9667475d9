//! Port for structured bridge-event logging.
//!
//! Defines the [`BridgeEventLogger`] trait for recording engine events
//! (admitted turns, state transitions, correlated and orphan results,
//! cleanup sweeps) to a structured log.
//!
//! This is separate from `tracing`-based operation logs: tracing handles
//! human-readable diagnostic messages, while this port captures a
//! machine-readable audit trail of every call's journey (JSONL).

use serde_json::Value;

/// Event type names emitted by the engine.
pub mod event_types {
    pub const TURN_ADMITTED: &str = "turn_admitted";
    pub const TURN_REJECTED: &str = "turn_rejected";
    pub const CALL_TRANSITIONED: &str = "call_transitioned";
    pub const RESULT_CORRELATED: &str = "result_correlated";
    pub const ORPHAN_RESULT: &str = "orphan_result";
    pub const SESSIONS_CLEANED: &str = "sessions_cleaned";
    pub const SESSION_ENDED: &str = "session_ended";
}

/// A structured bridge event: a type string and a JSON payload.
pub struct BridgeEvent {
    pub event_type: &'static str,
    pub payload: Value,
}

impl BridgeEvent {
    pub fn new(event_type: &'static str, payload: Value) -> Self {
        Self {
            event_type,
            payload,
        }
    }
}

/// Port for logging bridge events.
///
/// `log` is synchronous and infallible; a logger that cannot write drops the
/// event rather than disturbing the engine.
pub trait BridgeEventLogger: Send + Sync {
    fn log(&self, event: BridgeEvent);
}

/// No-op implementation for tests and when event logging is disabled.
pub struct NoEventLogger;

impl BridgeEventLogger for NoEventLogger {
    fn log(&self, _event: BridgeEvent) {}
}
