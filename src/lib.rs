//! Interval snapshots of nanopore sequencing runs, and marker-file coordination
//! between the snapshot producer and the downstream analysis pipeline.
//!
//! # Overview
//! A sequencing run is a directory the instrument keeps writing into for hours: a
//! metadata file that records when the run started, a summary table with one row per
//! read, and a growing set of sequence containers. seqsnap watches those directories and,
//! at configured offsets after the start of each run, freezes a *snapshot*:
//! * the reads that passed filtering and started sequencing before the offset,
//!   extracted from the sequence containers into a single fastq file
//! * a stats record merging run metadata with aggregates over those reads
//! * a copy of the summary table as it was when the snapshot was taken
//!
//! ```text
//! 16S_FGD0042_2hr.fastq
//! 16S_FGD0042_2hr_stats.txt
//! 16S_FGD0042_2hr.sequencing_summary
//! ```
//!
//! ## Markers
//! All processing state lives in zero-byte marker files, so a pass can be killed at any
//! point and the next one picks up where it left off.
//! * `<N>hr_started` and `<N>hr_complete` in the run directory bracket the work on one
//!   interval.
//! * `analysis_complete_<YYYYMMDD-HHMMSS>` in the run directory marks a run as finished
//!   for good.
//! * `process_running` in the pipeline input directory is the lock held while the
//!   downstream pipeline processes a snapshot.
//!
//! ## Passes
//! A [`Coordinator`] pass visits every run once; see [`coordinator`]. A [`PipelineGuard`]
//! poll hands at most one snapshot to the downstream [`guard::Pipeline`]. Both are meant
//! to be invoked periodically by an external scheduler, and both report through a
//! [`PassLog`].

pub mod config;
pub mod coordinator;
pub mod errors;
pub mod guard;
pub mod handoff;
pub mod pass_log;
pub mod reads;
pub mod run;
pub mod snapshot;

mod parse_utils;

// commonly used functions and types

pub use crate::config::Config;
pub use crate::coordinator::{Coordinator, PassReport};
pub use crate::guard::{GuardOutcome, PipelineGuard};
pub use crate::pass_log::PassLog;
pub use crate::run::Interval;
