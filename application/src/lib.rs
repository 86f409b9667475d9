//! Application layer for toolbridge
//!
//! This crate contains the bridge components, the ports they depend on, and
//! engine parameters. It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::{DEFAULT_FALLBACK_TEXT, EngineParams};
pub use ports::{
    clock::{Clock, ManualClock, SystemClock, measure},
    event_logger::{BridgeEvent, BridgeEventLogger, NoEventLogger, event_types},
};
pub use use_cases::bridge_engine::{
    AdmissionFailure, AdmissionOutcome, BridgeEngine, EngineStats, SessionEndReport,
};
pub use use_cases::coordinate_calls::Coordinator;
pub use use_cases::correlate_results::CorrelationStore;
pub use use_cases::drive_lifecycle::{
    CleanupReport, LifecycleStateMachine, LifecycleStats, TransitionDetails,
};
pub use use_cases::enforce_choice::ChoiceEnforcer;
pub use use_cases::shared::ScopeKey;
pub use use_cases::track_ids::IdTracker;
