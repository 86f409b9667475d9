//! Use cases
//!
//! The bridge's operations. Each component owns its own per-session state;
//! [`bridge_engine::BridgeEngine`] composes them into the turn flow.

pub mod bridge_engine;
pub mod coordinate_calls;
pub mod correlate_results;
pub mod drive_lifecycle;
pub mod enforce_choice;
pub(crate) mod shared;
pub mod track_ids;
