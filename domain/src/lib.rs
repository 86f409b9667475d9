//! Domain layer for toolbridge
//!
//! This crate contains the core types and pure algorithms of the tool-call
//! lifecycle and coordination engine. It has no dependencies on
//! infrastructure or presentation concerns, reads no clock and takes no locks.
//!
//! # Core Concepts
//!
//! ## Calls
//!
//! A turn producer proposes a batch of tool calls. Each is normalized into a
//! [`ToolCallRequest`] carrying a format-checked [`CallId`]. Results come back
//! later as [`ToolResultMessage`]s tagged by id.
//!
//! ## Lifecycle
//!
//! Every admitted call has a [`LifecycleEntry`] moving through
//! [`CallState`]: `pending -> in_progress -> completed | failed`, with
//! `cancelled` reachable from either non-terminal state.
//!
//! ## Coordination
//!
//! A batch is ordered by inferred resource dependencies (see
//! [`coordination`]) and, among ready calls, by [`OperationKind`] priority.
//!
//! ## Tool choice
//!
//! A [`ToolChoice`] directive is enforced against an [`AssistantResponse`],
//! producing a [`ChoiceVerdict`] that may carry a repaired response.

pub mod call;
pub mod choice;
pub mod coordination;
pub mod core;
pub mod correlation;
pub mod lifecycle;
pub mod session;

// Re-export commonly used types
pub use call::{
    AssistantResponse, CallId, FinishReason, IdSource, OperationKind, ProposedCall,
    RandomIdSource, ToolCallRequest, ToolResultMessage,
};
pub use choice::{ChoiceAction, ChoiceVerdict, ChoiceViolation, ToolChoice, ViolationKind};
pub use coordination::{
    CallResources, CoordinationIssue, CoordinationResult, DependencyGraph, DependencyMap,
    Diagnostic, DiagnosticCode, Schedule,
};
pub use core::{
    error::{BridgeError, ChoiceError, ErrorKind},
    timing::{Measured, Timing},
    validation::{ConfigIssue, ConfigIssueCode, Severity},
};
pub use correlation::{Correlation, CorrelationStats, CorrelationStatus};
pub use lifecycle::{CallMetadata, CallState, LifecycleEntry};
pub use session::{SessionId, SessionSnapshot, StateCounts};
