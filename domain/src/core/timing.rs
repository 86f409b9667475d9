//! Soft real-time budget measurement.
//!
//! Nothing in the engine blocks on I/O, so operations are never cancelled
//! mid-flight. Instead each mutating operation measures how long it took and
//! reports that against its budget in a [`Timing`]; exceeding the budget is
//! visible to the caller but does not by itself fail the operation.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Elapsed time of one operation compared with its budget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timing {
    pub elapsed: Duration,
    pub budget: Duration,
    pub over_budget: bool,
}

impl Timing {
    pub fn new(elapsed: Duration, budget: Duration) -> Self {
        Self {
            elapsed,
            budget,
            over_budget: elapsed > budget,
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed.as_millis() as u64
    }

    pub fn budget_ms(&self) -> u64 {
        self.budget.as_millis() as u64
    }
}

/// The outcome of an operation together with its [`Timing`].
///
/// `T` is usually a `Result`, so the measurement survives failed operations too.
#[derive(Debug, Clone)]
pub struct Measured<T> {
    pub outcome: T,
    pub timing: Timing,
}

impl<T> Measured<T> {
    pub fn new(outcome: T, timing: Timing) -> Self {
        Self { outcome, timing }
    }

    /// Discard the measurement.
    pub fn into_inner(self) -> T {
        self.outcome
    }

    pub fn over_budget(&self) -> bool {
        self.timing.over_budget
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Measured<U> {
        Measured {
            outcome: f(self.outcome),
            timing: self.timing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_within_budget() {
        let timing = Timing::new(Duration::from_millis(2), Duration::from_millis(5));
        assert!(!timing.over_budget);
        assert_eq!(timing.elapsed_ms(), 2);
        assert_eq!(timing.budget_ms(), 5);
    }

    #[test]
    fn test_exactly_on_budget_is_not_over() {
        let timing = Timing::new(Duration::from_millis(5), Duration::from_millis(5));
        assert!(!timing.over_budget);
    }

    #[test]
    fn test_over_budget() {
        let timing = Timing::new(Duration::from_millis(9), Duration::from_millis(5));
        assert!(timing.over_budget);
    }

    #[test]
    fn test_measured_map() {
        let measured = Measured::new(
            Ok::<u32, String>(2),
            Timing::new(Duration::ZERO, Duration::from_millis(1)),
        );
        let mapped = measured.map(|r| r.map(|v| v * 2));
        assert_eq!(mapped.into_inner(), Ok(4));
    }
}
