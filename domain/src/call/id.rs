//! Call identifiers.
//!
//! A [`CallId`] is an opaque token linking a proposed tool call to its
//! lifecycle entry, its correlation record and, eventually, its result.
//! Ids either come from upstream (the model's own `toolu_…`/`call_…` ids) or
//! are issued here by an [`IdSource`].
//!
//! # Examples
//!
//! ```
//! use toolbridge_domain::CallId;
//!
//! let id = CallId::generate();
//! assert!(id.as_str().starts_with("call_"));
//! assert!(CallId::validate_format(id.as_str()));
//!
//! assert!(CallId::validate_format("toolu_01A09q90qw90lq917835lq9"));
//! assert!(!CallId::validate_format("has spaces"));
//! assert!(CallId::new("").is_err());
//! ```

use crate::core::error::BridgeError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix of generated ids.
pub const CALL_ID_PREFIX: &str = "call_";
/// Number of hex characters after the prefix in generated ids.
pub const GENERATED_SUFFIX_LEN: usize = 24;
/// Longest id accepted from upstream.
pub const MAX_CALL_ID_LEN: usize = 64;

/// Opaque, format-checked call identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CallId(String);

impl CallId {
    /// Wrap an upstream id, rejecting it if the format check fails.
    pub fn new(id: impl Into<String>) -> Result<Self, BridgeError> {
        let id = id.into();
        if Self::validate_format(&id) {
            Ok(Self(id))
        } else {
            Err(BridgeError::InvalidId(id))
        }
    }

    /// Issue a fresh id: `call_` followed by 24 lowercase hex characters.
    pub fn generate() -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        Self(format!("{}{}", CALL_ID_PREFIX, &hex[..GENERATED_SUFFIX_LEN]))
    }

    /// Pure format predicate: 1 to 64 characters from `[A-Za-z0-9_-]`.
    pub fn validate_format(id: &str) -> bool {
        !id.is_empty()
            && id.len() <= MAX_CALL_ID_LEN
            && id
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    }

    /// Whether this id has the shape of an id issued by [`CallId::generate`].
    pub fn is_generated(&self) -> bool {
        self.0
            .strip_prefix(CALL_ID_PREFIX)
            .is_some_and(|rest| {
                rest.len() == GENERATED_SUFFIX_LEN
                    && rest.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
            })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for CallId {
    type Error = BridgeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for CallId {
    type Error = BridgeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CallId> for String {
    fn from(id: CallId) -> Self {
        id.0
    }
}

impl AsRef<str> for CallId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Source of fresh call ids.
///
/// Injected wherever ids are issued so tests can substitute a deterministic
/// sequence for the random default.
pub trait IdSource: Send + Sync {
    fn next_id(&self) -> CallId;
}

/// Default [`IdSource`] backed by [`CallId::generate`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdSource;

impl IdSource for RandomIdSource {
    fn next_id(&self) -> CallId {
        CallId::generate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_format() {
        let id = CallId::generate();
        assert!(id.is_generated(), "got: {id}");
        assert_eq!(id.as_str().len(), CALL_ID_PREFIX.len() + GENERATED_SUFFIX_LEN);
        assert!(CallId::validate_format(id.as_str()));
    }

    #[test]
    fn test_generate_is_collision_resistant() {
        let ids: HashSet<CallId> = (0..1000).map(|_| CallId::generate()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_validate_format() {
        assert!(CallId::validate_format("c1"));
        assert!(CallId::validate_format("call_abc-DEF_123"));
        assert!(!CallId::validate_format(""));
        assert!(!CallId::validate_format("call 1"));
        assert!(!CallId::validate_format("call/1"));
        assert!(!CallId::validate_format(&"x".repeat(MAX_CALL_ID_LEN + 1)));
        assert!(CallId::validate_format(&"x".repeat(MAX_CALL_ID_LEN)));
    }

    #[test]
    fn test_new_rejects_invalid() {
        let err = CallId::new("bad id").unwrap_err();
        assert_eq!(err, BridgeError::InvalidId("bad id".to_string()));
    }

    #[test]
    fn test_upstream_ids_are_not_generated() {
        let id = CallId::new("toolu_01A09q90qw90lq917835lq9").unwrap();
        assert!(!id.is_generated());
        let id = CallId::new("call_ABCDEF0123456789abcdef01").unwrap();
        assert!(!id.is_generated());
    }

    #[test]
    fn test_serde_round_trip_validates() {
        let id = CallId::new("c1").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"c1\"");

        let parsed: CallId = serde_json::from_str("\"c1\"").unwrap();
        assert_eq!(parsed, id);

        let bad: Result<CallId, _> = serde_json::from_str("\"not ok\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_random_id_source() {
        let source = RandomIdSource;
        assert_ne!(source.next_id(), source.next_id());
    }
}
