use chrono::Utc;

use crate::run::Interval;

/// Source of the current wall-clock time, in epoch seconds.
pub trait Clock {
    fn now(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// A clock stopped at a fixed instant.
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now(&self) -> i64 {
        self.0
    }
}

/// The instant at which `interval` falls due for a run started at `start_time`.
pub fn due_at(start_time: i64, interval: Interval) -> i64 {
    start_time + interval.seconds()
}

/// Whether `interval` is due for a run started at `start_time`. The boundary itself is due.
pub fn is_due(start_time: i64, interval: Interval, clock: &dyn Clock) -> bool {
    clock.now() >= due_at(start_time, interval)
}
