//! Tool choice directive.

use crate::core::error::ChoiceError;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::str::FromStr;

/// The caller's policy for whether, and which, functions a turn may call.
///
/// # Examples
///
/// ```
/// use toolbridge_domain::ToolChoice;
/// use serde_json::json;
///
/// let choice: ToolChoice = "function:read_file".parse().unwrap();
/// assert_eq!(choice, ToolChoice::Function("read_file".to_string()));
///
/// let wire = json!({"type": "function", "function": {"name": "read_file"}});
/// assert_eq!(ToolChoice::from_value(&wire).unwrap(), choice);
///
/// assert_eq!(ToolChoice::from_value(&json!("none")).unwrap(), ToolChoice::None);
/// assert!("function:".parse::<ToolChoice>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum ToolChoice {
    /// The model decides. Always compliant.
    #[default]
    Auto,
    /// No tool calls allowed.
    None,
    /// At least one tool call required.
    Required,
    /// Calls must target exactly this function.
    Function(String),
}

impl ToolChoice {
    /// Directive forcing `name`, rejecting a blank name.
    pub fn function(name: impl Into<String>) -> Result<Self, ChoiceError> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(ChoiceError::InvalidChoice(
                "forced function name is empty".to_string(),
            ));
        }
        Ok(ToolChoice::Function(trimmed.to_string()))
    }

    /// Parse the wire shapes: `"auto"`, `"none"`, `"required"`,
    /// `{"type": "function", "function": {"name": "X"}}` and `{"function": "X"}`.
    pub fn from_value(value: &Value) -> Result<Self, ChoiceError> {
        match value {
            Value::String(s) => s.parse(),
            Value::Object(map) => match map.get("function") {
                Some(Value::String(name)) => Self::function(name.as_str()),
                Some(Value::Object(function)) => match function.get("name") {
                    Some(Value::String(name)) => Self::function(name.as_str()),
                    _ => Err(ChoiceError::InvalidChoice(
                        "function directive has no name".to_string(),
                    )),
                },
                _ => match map.get("type").and_then(Value::as_str) {
                    Some(kind @ ("auto" | "none" | "required" | "any")) => kind.parse(),
                    _ => Err(ChoiceError::InvalidChoice(value.to_string())),
                },
            },
            Value::Null => Ok(ToolChoice::Auto),
            other => Err(ChoiceError::InvalidChoice(other.to_string())),
        }
    }

    /// Wire representation.
    pub fn to_value(&self) -> Value {
        match self {
            ToolChoice::Auto => json!("auto"),
            ToolChoice::None => json!("none"),
            ToolChoice::Required => json!("required"),
            ToolChoice::Function(name) => json!({"type": "function", "function": {"name": name}}),
        }
    }

    /// Forced function name, if any.
    pub fn forced_function(&self) -> Option<&str> {
        match self {
            ToolChoice::Function(name) => Some(name),
            _ => None,
        }
    }
}

impl FromStr for ToolChoice {
    type Err = ChoiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "auto" | "" => Ok(ToolChoice::Auto),
            "none" => Ok(ToolChoice::None),
            "required" | "any" => Ok(ToolChoice::Required),
            _ => match s.split_once(':') {
                Some((prefix, name)) if prefix.eq_ignore_ascii_case("function") => {
                    Self::function(name)
                }
                _ => Err(ChoiceError::InvalidChoice(s.to_string())),
            },
        }
    }
}

impl std::fmt::Display for ToolChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolChoice::Auto => write!(f, "auto"),
            ToolChoice::None => write!(f, "none"),
            ToolChoice::Required => write!(f, "required"),
            ToolChoice::Function(name) => write!(f, "function:{}", name),
        }
    }
}

impl TryFrom<Value> for ToolChoice {
    type Error = ChoiceError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(&value)
    }
}

impl From<ToolChoice> for Value {
    fn from(choice: ToolChoice) -> Self {
        choice.to_value()
    }
}
