//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! Every section is optional; missing keys take the engine defaults.

mod budgets;
mod choice;
mod engine;
mod logging;

pub use budgets::FileBudgetsConfig;
pub use choice::FileChoiceConfig;
pub use engine::FileEngineConfig;
pub use logging::FileLoggingConfig;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use toolbridge_application::EngineParams;
use toolbridge_domain::ConfigIssue;

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Session and batch limits, retention
    pub engine: FileEngineConfig,
    /// Soft budgets for the stateful components
    pub budgets: FileBudgetsConfig,
    /// Tool-choice enforcement
    pub choice: FileChoiceConfig,
    /// Log destinations
    pub logging: FileLoggingConfig,
}

impl FileConfig {
    /// Validate the entire configuration, returning all detected issues.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = self.engine.validate();
        issues.extend(self.budgets.validate());
        issues.extend(self.choice.validate());
        issues
    }

    /// Check if any issue is fatal.
    pub fn has_errors(issues: &[ConfigIssue]) -> bool {
        issues.iter().any(ConfigIssue::is_error)
    }

    /// Convert to the engine's parameters.
    pub fn to_engine_params(&self) -> EngineParams {
        EngineParams::default()
            .with_max_ids_per_session(self.engine.max_ids_per_session)
            .with_max_parallel_calls(self.engine.max_parallel_calls)
            .with_retention(Duration::from_secs(self.engine.retention_secs))
            .with_tracker_budget(Duration::from_millis(self.budgets.tracker_ms))
            .with_correlation_budget(Duration::from_millis(self.budgets.correlation_ms))
            .with_lifecycle_budget(Duration::from_millis(self.budgets.lifecycle_ms))
            .with_coordination_budget(Duration::from_millis(self.budgets.coordination_ms))
            .with_choice_timeout(Duration::from_millis(self.choice.timeout_ms))
            .with_fallback_text(self.choice.effective_fallback_text())
    }
}
