//! Soft budgets from TOML (`[budgets]` section)

use serde::{Deserialize, Serialize};
use toolbridge_application::EngineParams;
use toolbridge_domain::{ConfigIssue, ConfigIssueCode};

/// Per-operation soft budgets in milliseconds.
///
/// Exceeding a soft budget never fails the operation; it is logged and
/// reported in the operation's timing.
///
/// ```toml
/// [budgets]
/// tracker_ms = 5
/// correlation_ms = 5
/// lifecycle_ms = 5
/// coordination_ms = 10
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileBudgetsConfig {
    pub tracker_ms: u64,
    pub correlation_ms: u64,
    pub lifecycle_ms: u64,
    pub coordination_ms: u64,
}

impl Default for FileBudgetsConfig {
    fn default() -> Self {
        let params = EngineParams::default();
        Self {
            tracker_ms: params.tracker_budget.as_millis() as u64,
            correlation_ms: params.correlation_budget.as_millis() as u64,
            lifecycle_ms: params.lifecycle_budget.as_millis() as u64,
            coordination_ms: params.coordination_budget.as_millis() as u64,
        }
    }
}

impl FileBudgetsConfig {
    pub fn validate(&self) -> Vec<ConfigIssue> {
        [
            ("budgets.tracker_ms", self.tracker_ms),
            ("budgets.correlation_ms", self.correlation_ms),
            ("budgets.lifecycle_ms", self.lifecycle_ms),
            ("budgets.coordination_ms", self.coordination_ms),
        ]
        .into_iter()
        .filter(|(_, ms)| *ms == 0)
        .map(|(field, _)| {
            ConfigIssue::warning(
                ConfigIssueCode::ZeroBudget {
                    field: field.to_string(),
                },
                format!("{field} is 0, every operation will be reported over budget"),
            )
        })
        .collect()
    }
}
