use std::path::Path;

use chrono::{NaiveDateTime, TimeZone, Utc};
use lazy_static::lazy_static;
use regex::bytes::Regex;

use crate::errors::*;

/// Name suffix of the instrument's first raw-signal file, which carries the run metadata.
pub const METADATA_SUFFIX: &str = "_0.fast5";

const START_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

lazy_static! {
    // the metadata is binary, so `.` has to cross arbitrary bytes including newlines
    static ref START_TIME: Regex =
        Regex::new(r"(?s-u)exp_start_time.*?([0-9-]{10}T[0-9:]{8}Z)").unwrap();
}

/// Find the run start timestamp embedded in raw metadata bytes, as epoch seconds (UTC).
pub fn scan_start_time(bytes: &[u8]) -> std::result::Result<i64, String> {
    let captures = START_TIME
        .captures(bytes)
        .ok_or_else(|| "no exp_start_time timestamp".to_owned())?;
    let token = utf8(&captures[1]);

    let naive = NaiveDateTime::parse_from_str(&token, START_TIME_FORMAT)
        .map_err(|e| format!("malformed timestamp \"{token}\": {e}"))?;

    Ok(Utc.from_utc_datetime(&naive).timestamp())
}

/// Read an instrument metadata file and extract the run start time.
pub fn run_start_time(metadata_file: &Path) -> Result<i64> {
    let bytes = std::fs::read(metadata_file).map_err(|e| Error::file_io(metadata_file, e))?;

    scan_start_time(&bytes).map_err(|reason| Error::RunClock {
        file: metadata_file.display().to_string(),
        reason,
    })
}
