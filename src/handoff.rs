//! Delivering a finished snapshot to the location the downstream pipeline polls.

use crate::errors::*;
use crate::run::Interval;
use crate::snapshot::SnapshotPaths;

mod copy_handoff;
pub use copy_handoff::*;

mod scp_handoff;
pub use scp_handoff::*;

pub trait HandOff {
    /// Deliver all three artifacts of `snapshot`. Delivering the same snapshot again
    /// overwrites the earlier copy.
    fn transfer(&self, snapshot: &SnapshotPaths, interval: Interval) -> Result<()>;

    /// Where snapshots end up, for log messages.
    fn destination(&self) -> String;

    fn name(&self) -> &'static str;
}

/// Leaves snapshots where they were written.
pub struct NoHandOff;

impl NoHandOff {
    const NAME: &'static str = "NoHandOff";
}

impl HandOff for NoHandOff {
    fn transfer(&self, _snapshot: &SnapshotPaths, _interval: Interval) -> Result<()> {
        Ok(())
    }

    fn destination(&self) -> String {
        "local output directory".to_owned()
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}
