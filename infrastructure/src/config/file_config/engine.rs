//! Engine limits from TOML (`[engine]` section)

use serde::{Deserialize, Serialize};
use toolbridge_application::EngineParams;
use toolbridge_domain::{ConfigIssue, ConfigIssueCode};

/// Above this many calls per batch the limit is probably a typo.
const LARGE_BATCH: usize = 1024;

/// Above this many ids per session the limit is probably a typo.
const LARGE_SESSION: usize = 65_536;

/// Engine limits from TOML.
///
/// # Example
///
/// ```toml
/// [engine]
/// max_ids_per_session = 256
/// max_parallel_calls = 16
/// retention_secs = 600
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileEngineConfig {
    /// Maximum call ids tracked per session.
    pub max_ids_per_session: usize,
    /// Maximum calls accepted in one batch.
    pub max_parallel_calls: usize,
    /// Seconds a settled call is kept before cleanup sweeps it.
    pub retention_secs: u64,
}

impl Default for FileEngineConfig {
    fn default() -> Self {
        let params = EngineParams::default();
        Self {
            max_ids_per_session: params.max_ids_per_session,
            max_parallel_calls: params.max_parallel_calls,
            retention_secs: params.retention.as_secs(),
        }
    }
}

impl FileEngineConfig {
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        for (field, value, large) in [
            ("engine.max_ids_per_session", self.max_ids_per_session, LARGE_SESSION),
            ("engine.max_parallel_calls", self.max_parallel_calls, LARGE_BATCH),
        ] {
            if value == 0 {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::ZeroLimit {
                        field: field.to_string(),
                    },
                    format!("{field} must be greater than zero"),
                ));
            } else if value > large {
                issues.push(ConfigIssue::warning(
                    ConfigIssueCode::UnusuallyLarge {
                        field: field.to_string(),
                        value: value as u64,
                    },
                    format!("{field} = {value} is unusually large (expected at most {large})"),
                ));
            }
        }
        issues
    }
}
