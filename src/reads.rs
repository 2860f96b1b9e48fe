//! Selecting the reads observed by an interval and pulling their records out of
//! the instrument's sequence containers.

mod summary_table;
pub use summary_table::*;

mod fastq_extract;
pub use fastq_extract::*;

mod fastq_output;
pub use fastq_output::*;
