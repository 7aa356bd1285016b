use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock whose time only moves when told to. For tests and simulations.
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, delta: Duration) {
        *self.now.lock() += delta;
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock() = instant;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Wall-clock deadline for one processing cycle. Immutable once computed;
/// consulted only between batches, never inside one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cutoff {
    deadline: DateTime<Utc>,
}

impl Cutoff {
    pub fn at(deadline: DateTime<Utc>) -> Self {
        Self { deadline }
    }

    pub fn after(clock: &dyn Clock, window: Duration) -> Self {
        Self {
            deadline: clock.now() + window,
        }
    }

    pub fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }

    pub fn expired(&self, clock: &dyn Clock) -> bool {
        clock.now() >= self.deadline
    }
}
