//! Tool-choice enforcement settings from TOML (`[choice]` section)

use serde::{Deserialize, Serialize};
use toolbridge_application::{DEFAULT_FALLBACK_TEXT, EngineParams};
use toolbridge_domain::{ConfigIssue, ConfigIssueCode};

/// ```toml
/// [choice]
/// timeout_ms = 50
/// fallback_text = "Tools are disabled here."
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileChoiceConfig {
    /// Hard limit for one enforcement, in milliseconds.
    pub timeout_ms: u64,
    /// Text used when stripping calls leaves the response empty.
    pub fallback_text: String,
}

impl Default for FileChoiceConfig {
    fn default() -> Self {
        let params = EngineParams::default();
        Self {
            timeout_ms: params.choice_timeout.as_millis() as u64,
            fallback_text: params.fallback_text,
        }
    }
}

impl FileChoiceConfig {
    /// The fallback text to use; blank values fall back to the default.
    pub fn effective_fallback_text(&self) -> &str {
        if self.fallback_text.trim().is_empty() {
            DEFAULT_FALLBACK_TEXT
        } else {
            &self.fallback_text
        }
    }

    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        if self.timeout_ms == 0 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::ZeroLimit {
                    field: "choice.timeout_ms".to_string(),
                },
                "choice.timeout_ms must be greater than zero",
            ));
        }
        if self.fallback_text.trim().is_empty() {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::EmptyValue {
                    field: "choice.fallback_text".to_string(),
                },
                "choice.fallback_text is blank, using the built-in text",
            ));
        }
        issues
    }
}
