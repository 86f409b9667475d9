//! Engine parameters: limits and soft budgets.
//!
//! [`EngineParams`] groups the static parameters every component of the
//! engine is constructed from. These are application-layer concerns; the
//! file/env representation lives in the infrastructure layer.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Text substituted when tool calls are stripped from an otherwise empty response.
pub const DEFAULT_FALLBACK_TEXT: &str =
    "Tool use is disabled for this request, so no tools were called.";

/// Limits and budgets for the engine components.
///
/// | Parameter | Used by |
/// |-----------|---------|
/// | `max_ids_per_session`, `tracker_budget` | `IdTracker` |
/// | `max_parallel_calls` | `Coordinator` |
/// | `correlation_budget` | `CorrelationStore` |
/// | `lifecycle_budget` | `LifecycleStateMachine` |
/// | `coordination_budget` | `Coordinator` |
/// | `choice_timeout`, `fallback_text` | `ChoiceEnforcer` |
/// | `retention` | `BridgeEngine::cleanup_expired` |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineParams {
    /// Maximum ids tracked per session.
    pub max_ids_per_session: usize,
    /// Maximum calls in one coordinated batch.
    pub max_parallel_calls: usize,
    /// Soft budget for each id tracker mutation.
    pub tracker_budget: Duration,
    /// Soft budget for each correlation store mutation.
    pub correlation_budget: Duration,
    /// Soft budget for each lifecycle mutation.
    pub lifecycle_budget: Duration,
    /// Soft budget for ordering one batch.
    pub coordination_budget: Duration,
    /// Hard limit for choice enforcement; exceeding it fails the enforcement.
    pub choice_timeout: Duration,
    /// Age after which terminal entries are swept.
    pub retention: Duration,
    pub fallback_text: String,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            max_ids_per_session: 128,
            max_parallel_calls: 32,
            tracker_budget: Duration::from_millis(5),
            correlation_budget: Duration::from_millis(5),
            lifecycle_budget: Duration::from_millis(5),
            coordination_budget: Duration::from_millis(10),
            choice_timeout: Duration::from_millis(50),
            retention: Duration::from_secs(300),
            fallback_text: DEFAULT_FALLBACK_TEXT.to_string(),
        }
    }
}

impl EngineParams {
    // ==================== Builder Methods ====================

    pub fn with_max_ids_per_session(mut self, max: usize) -> Self {
        self.max_ids_per_session = max;
        self
    }

    pub fn with_max_parallel_calls(mut self, max: usize) -> Self {
        self.max_parallel_calls = max;
        self
    }

    pub fn with_tracker_budget(mut self, budget: Duration) -> Self {
        self.tracker_budget = budget;
        self
    }

    pub fn with_correlation_budget(mut self, budget: Duration) -> Self {
        self.correlation_budget = budget;
        self
    }

    pub fn with_lifecycle_budget(mut self, budget: Duration) -> Self {
        self.lifecycle_budget = budget;
        self
    }

    pub fn with_coordination_budget(mut self, budget: Duration) -> Self {
        self.coordination_budget = budget;
        self
    }

    pub fn with_choice_timeout(mut self, timeout: Duration) -> Self {
        self.choice_timeout = timeout;
        self
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_fallback_text(mut self, text: impl Into<String>) -> Self {
        self.fallback_text = text.into();
        self
    }
}
