//! Choice enforcer: applies a tool-choice directive to a candidate response.
//!
//! Evaluation is a synchronous computation followed by an elapsed-time
//! check. Running past the timeout fails the enforcement outright; the
//! verdict is discarded rather than returned late.

use crate::ports::clock::{Clock, measure};
use std::sync::Arc;
use std::time::Duration;
use toolbridge_domain::choice::evaluate;
use toolbridge_domain::{AssistantResponse, ChoiceAction, ChoiceError, ChoiceVerdict, ToolChoice};
use tracing::{debug, warn};

pub struct ChoiceEnforcer {
    clock: Arc<dyn Clock>,
    timeout: Duration,
    fallback_text: String,
}

impl ChoiceEnforcer {
    pub fn new(clock: Arc<dyn Clock>, timeout: Duration, fallback_text: impl Into<String>) -> Self {
        Self {
            clock,
            timeout,
            fallback_text: fallback_text.into(),
        }
    }

    pub fn enforce_choice(
        &self,
        choice: &ToolChoice,
        response: &AssistantResponse,
    ) -> Result<ChoiceVerdict, ChoiceError> {
        let measured = measure(self.clock.as_ref(), self.timeout, |_| {
            evaluate(choice, response, &self.fallback_text)
        });

        if measured.over_budget() {
            warn!(
                %choice,
                elapsed_ms = measured.timing.elapsed_ms(),
                budget_ms = measured.timing.budget_ms(),
                "Tool choice enforcement timed out"
            );
            return Err(ChoiceError::ProcessingTimeout {
                elapsed_ms: measured.timing.elapsed_ms(),
                budget_ms: measured.timing.budget_ms(),
            });
        }

        let verdict = measured.outcome.with_timing(measured.timing);
        match verdict.action {
            ChoiceAction::None => debug!(%choice, "Response complies with tool choice"),
            ChoiceAction::RejectResponse => warn!(
                %choice,
                violations = verdict.violations.len(),
                "Response rejected by tool choice"
            ),
            action => debug!(%choice, %action, "Response repaired for tool choice"),
        }
        Ok(verdict)
    }

    pub fn fallback_text(&self) -> &str {
        &self.fallback_text
    }
}
