//! Correlation domain module
//!
//! A [`Correlation`] links an issued call id to its eventual result. It is
//! created `pending` when the call is admitted and moves to `completed`
//! exactly once, when a result carrying the same id arrives.

use crate::call::CallId;
use crate::core::error::BridgeError;
use crate::session::SessionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Correlation status. The only transition is `Pending -> Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationStatus {
    Pending,
    Completed,
}

impl CorrelationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CorrelationStatus::Pending => "pending",
            CorrelationStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for CorrelationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bookkeeping record for one issued call id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correlation {
    pub call_id: CallId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    pub created_at: DateTime<Utc>,
    pub status: CorrelationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Correlation {
    pub fn new(call_id: CallId, session_id: Option<SessionId>, now: DateTime<Utc>) -> Self {
        Self {
            call_id,
            session_id,
            created_at: now,
            status: CorrelationStatus::Pending,
            completed_at: None,
        }
    }

    /// Mark the correlation completed.
    ///
    /// A completed correlation no longer matches incoming results, so a second
    /// result for the same id is reported as [`BridgeError::CallNotFound`].
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), BridgeError> {
        if self.status != CorrelationStatus::Pending {
            return Err(BridgeError::CallNotFound(self.call_id.to_string()));
        }
        self.status = CorrelationStatus::Completed;
        self.completed_at = Some(now);
        Ok(())
    }

    pub fn is_pending(&self) -> bool {
        self.status == CorrelationStatus::Pending
    }
}

/// Counts of correlation records by status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CorrelationStats {
    pub pending: usize,
    pub completed: usize,
    pub total: usize,
    /// Sessions with at least one record (sessionless records excluded).
    pub sessions: usize,
}
