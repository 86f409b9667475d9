//! Infrastructure layer for toolbridge
//!
//! This crate contains adapters for the ports defined in the application
//! layer, plus configuration file loading.

pub mod config;
pub mod logging;

// Re-export commonly used types
pub use config::{
    ConfigError, ConfigLoader, FileBudgetsConfig, FileChoiceConfig, FileConfig,
    FileEngineConfig, FileLoggingConfig,
};
pub use logging::JsonlEventLogger;
