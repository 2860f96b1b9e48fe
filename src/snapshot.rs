//! The three artifacts produced for one run and interval, and the run metadata merged
//! into them.

mod stats_record;
pub use stats_record::*;

mod registry;
pub use registry::*;

mod snapshot_writer;
pub use snapshot_writer::*;
