use std::path::Path;

use crate::run::Interval;

pub type Result<T> = std::result::Result<T, Error>;

type BoxedError = Box<dyn std::error::Error + Send + Sync>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Error reading or writing \"{file}\": {source}")]
    FileIo { file: String, source: BoxedError },

    #[error("Error parsing record {idx} in \"{origin}\": {source}")]
    ParseRecord {
        origin: String,
        idx: usize,
        source: BoxedError,
    },

    #[error("No file matching \"*{pattern}\" under \"{dir}\"")]
    MissingFile { dir: String, pattern: &'static str },

    #[error("No run start time in \"{file}\": {reason}")]
    RunClock { file: String, reason: String },

    #[error("No run identifier matching \"{pattern}\" in run directory name \"{name}\"")]
    RunId { name: String, pattern: String },

    #[error("Summary table \"{file}\" has no \"{column}\" column")]
    MissingColumn { file: String, column: &'static str },

    #[error("Error parsing \"{string}\" in {context}: {reason}")]
    Parse {
        string: String,
        context: String,
        reason: &'static str,
    },

    #[error("Invalid configuration in \"{file}\": {reason}")]
    Config { file: String, reason: String },

    #[error("Hand-off via {context} failed for {interval} snapshot: {reason}")]
    HandOff {
        context: &'static str,
        interval: Interval,
        reason: String,
    },

    #[error("Downstream pipeline {context} failed for \"{prefix}\": {reason}")]
    Pipeline {
        context: &'static str,
        prefix: String,
        reason: String,
    },

    #[error("Checksum mismatch for \"{file}\": stats record has {expected}, file has {found}")]
    Checksum {
        file: String,
        expected: String,
        found: String,
    },
}

impl Error {
    pub fn file_io(path: impl AsRef<Path>, source: impl Into<BoxedError>) -> Self {
        Error::FileIo {
            file: path.as_ref().display().to_string(),
            source: source.into(),
        }
    }
}

pub fn utf8(b: &[u8]) -> String {
    String::from_utf8_lossy(b).into_owned()
}
