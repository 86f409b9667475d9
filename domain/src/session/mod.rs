//! Session domain module
//!
//! All engine state is keyed by session. A session owns the lifecycle
//! entries it created; [`SessionSnapshot`] is the derived aggregate view of
//! one session that callers poll.

pub mod id;
pub mod snapshot;

pub use id::SessionId;
pub use snapshot::{SessionSnapshot, StateCounts};
