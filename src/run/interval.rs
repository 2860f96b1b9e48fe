use std::fmt;

use serde::Deserialize;

const SECONDS_PER_HOUR: i64 = 3600;

/// A checkpoint, in whole hours since the start of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(transparent)]
pub struct Interval(u32);

impl Interval {
    pub const fn from_hours(hours: u32) -> Self {
        Self(hours)
    }

    pub fn hours(self) -> u32 {
        self.0
    }

    pub fn seconds(self) -> i64 {
        self.0 as i64 * SECONDS_PER_HOUR
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}hr", self.0)
    }
}
