//! Logging destinations from TOML (`[logging]` section)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where diagnostic logs and the bridge event log are written.
///
/// Command-line flags take precedence over these values.
///
/// ```toml
/// [logging]
/// log_dir = "~/.local/state/toolbridge/logs"
/// events_file = "./toolbridge.events.jsonl"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    /// Directory for rolling diagnostic log files. Logs go to stderr when unset.
    pub log_dir: Option<String>,
    /// JSONL file for bridge events. Event logging is off when unset.
    pub events_file: Option<String>,
}

impl FileLoggingConfig {
    pub fn log_dir_path(&self) -> Option<PathBuf> {
        self.log_dir.as_deref().map(expand_home)
    }

    pub fn events_path(&self) -> Option<PathBuf> {
        self.events_file.as_deref().map(expand_home)
    }
}

/// Expand a leading `~/` to the home directory.
fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_unset_by_default() {
        let config = FileLoggingConfig::default();
        assert!(config.log_dir_path().is_none());
        assert!(config.events_path().is_none());
    }

    #[test]
    fn test_plain_path_is_kept() {
        let config = FileLoggingConfig {
            events_file: Some("out/events.jsonl".to_string()),
            ..Default::default()
        };
        assert_eq!(config.events_path(), Some(PathBuf::from("out/events.jsonl")));
    }
}
