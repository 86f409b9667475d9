//! Severity levels and configuration issues.
//!
//! [`Severity`] is shared by coordination diagnostics, tool-choice violations
//! and configuration validation, so every layer reports problems on the same
//! two-level scale.
//!
//! # Examples
//!
//! ```
//! use toolbridge_domain::core::validation::{ConfigIssue, ConfigIssueCode, Severity};
//!
//! let issue = ConfigIssue::error(
//!     ConfigIssueCode::ZeroLimit { field: "engine.max_parallel_calls".to_string() },
//!     "engine.max_parallel_calls must be greater than zero",
//! );
//! assert!(issue.is_error());
//! ```

use serde::{Deserialize, Serialize};

/// Severity level of an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Fatal: the input cannot be used as is.
    Error,
    /// Non-fatal: processing continues but the caller should know.
    Warning,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies a specific configuration issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigIssueCode {
    /// A limit that must be positive was set to zero.
    ZeroLimit { field: String },
    /// A budget of zero makes every operation report as over budget.
    ZeroBudget { field: String },
    /// A limit far beyond the expected per-turn batch size.
    UnusuallyLarge { field: String, value: u64 },
    /// A string field that must not be blank.
    EmptyValue { field: String },
}

/// A detected issue in the configuration.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: Severity,
    pub code: ConfigIssueCode,
    pub message: String,
}

impl ConfigIssue {
    pub fn error(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
        }
    }

    pub fn warning(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_display() {
        assert_eq!(Severity::Error.to_string(), "error");
        assert_eq!(Severity::Warning.to_string(), "warning");
    }

    #[test]
    fn test_severity_serde() {
        let json = serde_json::to_string(&Severity::Warning).unwrap();
        assert_eq!(json, "\"warning\"");
        let parsed: Severity = serde_json::from_str("\"error\"").unwrap();
        assert_eq!(parsed, Severity::Error);
    }

    #[test]
    fn test_issue_constructors() {
        let warn = ConfigIssue::warning(
            ConfigIssueCode::ZeroBudget {
                field: "budgets.correlation_ms".to_string(),
            },
            "zero budget",
        );
        assert!(!warn.is_error());
        assert_eq!(warn.severity, Severity::Warning);
    }
}
