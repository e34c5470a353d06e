//! Injected time and randomness.
//!
//! Components never call `Utc::now()` or a thread RNG directly; they hold an
//! `Arc<dyn Clock>` / `Arc<dyn JitterSource>` so tests can pin both.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use std::sync::Mutex;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Source of the multiplicative jitter factor applied to retry delays.
pub trait JitterSource: Send + Sync {
    /// A factor in `[0.5, 1.0]`.
    fn factor(&self) -> f64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RandomJitter;

impl JitterSource for RandomJitter {
    fn factor(&self) -> f64 {
        rand::rng().random_range(0.5..=1.0)
    }
}

/// Deterministic jitter for tests. Values outside `[0.5, 1.0]` are clamped.
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(pub f64);

impl JitterSource for FixedJitter {
    fn factor(&self) -> f64 {
        self.0.clamp(0.5, 1.0)
    }
}
