//! Call domain module
//!
//! Identifiers, requests, results and candidate responses for tool calls.
//!
//! ```text
//! ProposedCall ──into_request()──▶ ToolCallRequest ──(executor)──▶ ToolResultMessage
//!      (id-or-null, JSON args)        (CallId, serialized args)       (tool_call_id, content)
//! ```
//!
//! Every function name maps to an [`OperationKind`](kind::OperationKind),
//! which drives resource inference and scheduling priority in
//! [`crate::coordination`].

pub mod entities;
pub mod id;
pub mod kind;
pub mod response;

pub use entities::{ProposedCall, ToolCallRequest, ToolResultMessage};
pub use id::{CallId, IdSource, RandomIdSource};
pub use kind::OperationKind;
pub use response::{AssistantResponse, FinishReason};
