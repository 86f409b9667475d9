//! Port for reading the current time.
//!
//! Every timestamp and every budget measurement in the engine goes through a
//! [`Clock`], so tests can drive retention sweeps and over-budget paths with a
//! [`ManualClock`] instead of sleeping.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::time::Duration;
use toolbridge_domain::{Measured, Timing};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests.
///
/// With an auto-step set, every read advances the clock by that amount
/// after returning, so any measured operation appears to take at least one
/// step.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    step: Mutex<chrono::Duration>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
            step: Mutex::new(chrono::Duration::zero()),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += to_chrono(by);
    }

    pub fn with_auto_step(self, step: Duration) -> Self {
        *self.step.lock() = to_chrono(step);
        self
    }

    pub fn set_auto_step(&self, step: Duration) {
        *self.step.lock() = to_chrono(step);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let step = *self.step.lock();
        let mut now = self.now.lock();
        let current = *now;
        *now += step;
        current
    }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::MAX)
}

/// Run `f` and measure it against `budget` using `clock`.
///
/// The closure also receives the start time, so a measured operation can
/// stamp its own records without a second clock read.
pub fn measure<T>(
    clock: &dyn Clock,
    budget: Duration,
    f: impl FnOnce(DateTime<Utc>) -> T,
) -> Measured<T> {
    let start = clock.now();
    let outcome = f(start);
    let elapsed = (clock.now() - start).to_std().unwrap_or(Duration::ZERO);
    Measured::new(outcome, Timing::new(elapsed, budget))
}
