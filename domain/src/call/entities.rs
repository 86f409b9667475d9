//! Call domain entities
//!
//! - [`ProposedCall`]: a call as emitted by the turn producer (id may be missing,
//!   arguments are arbitrary JSON)
//! - [`ToolCallRequest`]: a normalized call: validated id, function name and the
//!   canonical serialized argument payload
//! - [`ToolResultMessage`]: a result submitted later by the external executor

use super::id::{CallId, IdSource};
use crate::core::error::BridgeError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A normalized call: `{id, function name, serialized argument payload}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Call identifier
    pub id: CallId,
    /// Function (tool) name
    pub name: String,
    /// Serialized JSON arguments, exactly as they will be forwarded
    pub arguments: String,
}

impl ToolCallRequest {
    pub fn new(id: CallId, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Build a request from structured arguments.
    pub fn with_json(id: CallId, name: impl Into<String>, arguments: &Value) -> Self {
        Self::new(id, name, arguments.to_string())
    }

    /// Parse the argument payload as a JSON object.
    ///
    /// Returns `None` when the payload is not valid JSON or not an object.
    pub fn argument_map(&self) -> Option<Map<String, Value>> {
        match serde_json::from_str::<Value>(&self.arguments) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        }
    }

    /// Get a string argument by key.
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.argument_map()
            .and_then(|m| m.get(key).and_then(|v| v.as_str().map(str::to_string)))
    }
}

/// A call as proposed by the turn producer: `{id-or-null, name, arguments}`.
///
/// Deserializes from either the flat shape
/// `{"id": "c1", "name": "read_file", "arguments": {...}}` or the nested
/// function-calling wire shape
/// `{"id": "c1", "type": "function", "function": {"name": "read_file", "arguments": "{...}"}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireCall")]
pub struct ProposedCall {
    pub id: Option<String>,
    pub name: String,
    pub arguments: Value,
}

impl ProposedCall {
    pub fn new(id: Option<&str>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.map(str::to_string),
            name: name.into(),
            arguments,
        }
    }

    /// Normalize into a [`ToolCallRequest`].
    ///
    /// A missing or blank id is replaced by a fresh one from `ids`; a present id
    /// must pass the format check. Arguments that are already a JSON string are
    /// forwarded verbatim, `null` becomes `{}`, anything else is serialized.
    pub fn into_request(self, ids: &dyn IdSource) -> Result<ToolCallRequest, BridgeError> {
        let id = match self.id {
            Some(raw) if !raw.trim().is_empty() => CallId::new(raw)?,
            _ => ids.next_id(),
        };

        let arguments = match self.arguments {
            Value::String(s) => s,
            Value::Null => "{}".to_string(),
            other => other.to_string(),
        };

        Ok(ToolCallRequest {
            id,
            name: self.name,
            arguments,
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireCall {
    Nested {
        #[serde(default)]
        id: Option<String>,
        function: WireFunction,
    },
    Flat {
        #[serde(default)]
        id: Option<String>,
        name: String,
        #[serde(default)]
        arguments: Value,
    },
}

#[derive(Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

impl From<WireCall> for ProposedCall {
    fn from(wire: WireCall) -> Self {
        match wire {
            WireCall::Nested { id, function } => Self {
                id,
                name: function.name,
                arguments: function.arguments,
            },
            WireCall::Flat {
                id,
                name,
                arguments,
            } => Self {
                id,
                name,
                arguments,
            },
        }
    }
}

/// A result message from the external result submitter: `{tool_call_id, content}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResultMessage {
    /// The id the result claims to answer. Not format-checked on arrival;
    /// an unknown or malformed id is reported as an orphan result.
    pub tool_call_id: String,
    /// Result content
    pub content: String,
}

impl ToolResultMessage {
    pub fn new(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
        }
    }
}
