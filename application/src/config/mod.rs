//! Application-level configuration.
//!
//! - [`EngineParams`]: limits and soft budgets shared by all engine components

pub mod engine_params;

pub use engine_params::{DEFAULT_FALLBACK_TEXT, EngineParams};
