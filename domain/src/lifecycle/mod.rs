//! Lifecycle domain module
//!
//! Each admitted call gets one [`LifecycleEntry`] in its session, created in
//! `pending` and advanced through the fixed table in [`state`] until it
//! reaches a terminal state. The state machine component that owns the
//! per-session tables lives in the application layer.

pub mod entry;
pub mod state;

pub use entry::{CallMetadata, LifecycleEntry};
pub use state::CallState;
