//! Zero-byte marker files. Their existence is the only state the system keeps.
//!
//! Markers are placed with create-exclusive semantics, so of two invocations racing
//! to place the same marker exactly one observes [`Claim::Placed`].

use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{Local, TimeZone};

use crate::errors::*;
use crate::run::Interval;

/// Lock held by the pipeline guard while a snapshot is being processed.
pub const PROCESS_RUNNING: &str = "process_running";

/// Prefix of the terminal marker of a run.
pub const ANALYSIS_COMPLETE: &str = "analysis_complete";

pub fn started(interval: Interval) -> String {
    format!("{interval}_started")
}

pub fn complete(interval: Interval) -> String {
    format!("{interval}_complete")
}

/// `analysis_complete_<YYYYMMDD-HHMMSS>`, in local time.
pub fn analysis_complete(epoch_secs: i64) -> String {
    match Local.timestamp_opt(epoch_secs, 0).single() {
        Some(at) => format!("{ANALYSIS_COMPLETE}_{}", at.format("%Y%m%d-%H%M%S")),
        None => format!("{ANALYSIS_COMPLETE}_{epoch_secs}"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    Placed,
    AlreadyPresent,
}

pub fn place(dir: &Path, name: &str) -> Result<Claim> {
    let path = dir.join(name);

    match OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(_) => Ok(Claim::Placed),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(Claim::AlreadyPresent),
        Err(e) => Err(Error::file_io(&path, e)),
    }
}

pub fn exists(dir: &Path, name: &str) -> bool {
    dir.join(name).exists()
}

/// Remove a marker. Removing a marker that is already gone is not an error.
pub fn remove(dir: &Path, name: &str) -> Result<()> {
    let path = dir.join(name);

    match fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::file_io(&path, e)),
    }
}

/// First marker in `dir` whose name starts with `prefix`.
pub fn find_prefixed(dir: &Path, prefix: &str) -> Result<Option<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| Error::file_io(dir, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| Error::file_io(dir, e))?;
        if entry.file_name().to_string_lossy().starts_with(prefix) {
            return Ok(Some(entry.path()));
        }
    }

    Ok(None)
}
