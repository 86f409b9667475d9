//! Lifecycle entries.
//!
//! A [`LifecycleEntry`] is the stateful record of one call inside the session
//! that admitted it. Entries are created in [`CallState::Pending`] and only
//! change through [`LifecycleEntry::apply`], which enforces the transition
//! table from [`super::state`].

use super::state::CallState;
use crate::call::{CallId, ToolCallRequest};
use crate::core::error::BridgeError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Opaque key/value passthrough attached to an entry.
///
/// The engine never interprets these values. Callers use it to carry their
/// own bookkeeping (turn numbers, executor names, trace ids) alongside the
/// call. Merging is shallow and later keys win.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallMetadata(BTreeMap<String, Value>);

impl CallMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Merge `other` into `self`; keys in `other` overwrite.
    pub fn merge(&mut self, other: CallMetadata) {
        self.0.extend(other.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

/// Stateful record tracking one call through the lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEntry {
    pub id: CallId,
    pub request: ToolCallRequest,
    pub state: CallState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set exactly when the entry enters a terminal state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "CallMetadata::is_empty")]
    pub metadata: CallMetadata,
}

impl LifecycleEntry {
    /// Create a pending entry for `request`.
    pub fn new(request: ToolCallRequest, metadata: CallMetadata, now: DateTime<Utc>) -> Self {
        Self {
            id: request.id.clone(),
            request,
            state: CallState::Pending,
            created_at: now,
            updated_at: now,
            completed_at: None,
            result: None,
            error: None,
            metadata,
        }
    }

    /// Move to `next`, recording result/error/metadata.
    ///
    /// Fails with [`BridgeError::InvalidTransition`] and leaves the entry
    /// untouched when the edge is not in the table.
    pub fn apply(
        &mut self,
        next: CallState,
        result: Option<String>,
        error: Option<String>,
        metadata: Option<CallMetadata>,
        now: DateTime<Utc>,
    ) -> Result<(), BridgeError> {
        if !self.state.can_transition_to(next) {
            return Err(BridgeError::InvalidTransition {
                id: self.id.clone(),
                from: self.state,
                to: next,
            });
        }

        self.state = next;
        self.updated_at = now;
        if next.is_terminal() {
            self.completed_at = Some(now);
        }
        if result.is_some() {
            self.result = result;
        }
        if error.is_some() {
            self.error = error;
        }
        if let Some(metadata) = metadata {
            self.metadata.merge(metadata);
        }
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// The time retention is measured from: completion if stamped, otherwise last update.
    pub fn settled_at(&self) -> DateTime<Utc> {
        self.completed_at.unwrap_or(self.updated_at)
    }

    /// Rough in-memory footprint, used for cleanup reporting.
    pub fn estimated_bytes(&self) -> usize {
        serde_json::to_vec(self)
            .map(|v| v.len())
            .unwrap_or_else(|_| self.request.arguments.len() + self.id.as_str().len())
    }
}
