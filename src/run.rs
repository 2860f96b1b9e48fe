//! Runs, intervals, and the on-disk markers that record their processing state.

mod interval;
pub use interval::*;

pub mod markers;

mod run_clock;
pub use run_clock::*;

mod run_directory;
pub use run_directory::*;

mod gate;
pub use gate::*;
