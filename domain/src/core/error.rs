//! Domain error types
//!
//! Every expected failure of the engine is a value of [`BridgeError`] (or
//! [`ChoiceError`] for the choice enforcer). Each variant maps onto one of the
//! five [`ErrorKind`] categories so callers can branch on the category without
//! matching every variant.

use crate::call::id::CallId;
use crate::lifecycle::state::CallState;
use crate::session::SessionId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed, duplicate or oversized input.
    InputValidation,
    /// Unknown session or call.
    NotFound,
    /// Illegal lifecycle edge.
    InvalidTransition,
    /// An operation exceeded its budget.
    Timeout,
    /// Duplicate id or correlation.
    Conflict,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InputValidation => "input_validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidTransition => "invalid_transition",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Conflict => "conflict",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures of the id tracker, correlation store and lifecycle state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("Invalid call id: {0:?}")]
    InvalidId(String),

    #[error("Call id already tracked: {0}")]
    DuplicateId(CallId),

    #[error("Session {session} already holds the maximum of {max} call ids")]
    SessionCapacityExceeded { session: SessionId, max: usize },

    #[error("Call id not tracked: {0}")]
    NotTracked(CallId),

    #[error("Call id already correlated: {0}")]
    DuplicateCorrelation(CallId),

    #[error("No pending call matches result id {0}")]
    CallNotFound(String),

    #[error("Unknown session: {0}")]
    SessionNotFound(SessionId),

    #[error("Unknown call {id} in session {session}")]
    EntryNotFound { session: SessionId, id: CallId },

    #[error("Call {id} already has a lifecycle entry in session {session}")]
    DuplicateEntry { session: SessionId, id: CallId },

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid transition for {id}: {from} -> {to}")]
    InvalidTransition {
        id: CallId,
        from: CallState,
        to: CallState,
    },
}

impl BridgeError {
    /// The taxonomy category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::InvalidId(_)
            | BridgeError::SessionCapacityExceeded { .. }
            | BridgeError::MissingField(_) => ErrorKind::InputValidation,
            BridgeError::NotTracked(_)
            | BridgeError::CallNotFound(_)
            | BridgeError::SessionNotFound(_)
            | BridgeError::EntryNotFound { .. } => ErrorKind::NotFound,
            BridgeError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            BridgeError::DuplicateId(_)
            | BridgeError::DuplicateCorrelation(_)
            | BridgeError::DuplicateEntry { .. } => ErrorKind::Conflict,
        }
    }

    /// Check if this error means the referenced session or call is unknown
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

/// Failures of the choice enforcer itself (as opposed to violations found in
/// the response, which are reported inside the verdict).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChoiceError {
    #[error("Invalid tool choice: {0}")]
    InvalidChoice(String),

    #[error("Tool choice processing exceeded its budget ({elapsed_ms}ms > {budget_ms}ms)")]
    ProcessingTimeout { elapsed_ms: u64, budget_ms: u64 },
}

impl ChoiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChoiceError::InvalidChoice(_) => ErrorKind::InputValidation,
            ChoiceError::ProcessingTimeout { .. } => ErrorKind::Timeout,
        }
    }
}
