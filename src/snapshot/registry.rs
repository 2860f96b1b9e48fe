use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, Trim};

use crate::errors::*;
use crate::snapshot::StatsRecord;

/// Externally recorded metadata for runs, keyed by run identifier.
pub trait RunRegistry {
    /// Metadata for `run_id`. An unknown run has no metadata; that is not an error.
    fn lookup(&self, run_id: &str) -> Result<StatsRecord>;
}

/// A registry with nothing in it.
pub struct EmptyRegistry;

impl RunRegistry for EmptyRegistry {
    fn lookup(&self, _run_id: &str) -> Result<StatsRecord> {
        Ok(StatsRecord::new())
    }
}

/// A tab-separated export of the run-stats sheet: a header row, then one row per run
/// with the run identifier in the first column.
///
/// The file is re-read on every lookup so edits made between passes are picked up.
pub struct TsvRegistry {
    path: PathBuf,
    aliases: Vec<(String, String)>,
}

impl TsvRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            aliases: Vec::new(),
        }
    }

    /// Replace `from` with `to` in registry keys before matching, to absorb
    /// known typos in hand-entered identifiers.
    pub fn with_alias(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.aliases.push((from.into(), to.into()));
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn normalize(&self, key: &str) -> String {
        self.aliases
            .iter()
            .fold(key.to_owned(), |k, (from, to)| k.replace(from.as_str(), to))
    }
}

impl RunRegistry for TsvRegistry {
    fn lookup(&self, run_id: &str) -> Result<StatsRecord> {
        let mut rdr = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_path(&self.path)
            .map_err(|e| Error::file_io(&self.path, e))?;

        let headers = rdr
            .headers()
            .map_err(|e| Error::file_io(&self.path, e))?
            .clone();
        let mut metadata = StatsRecord::new();

        for (idx, row) in rdr.records().enumerate() {
            let row = row.map_err(|e| Error::ParseRecord {
                origin: self.path.display().to_string(),
                idx: idx + 1,
                source: Box::new(e),
            })?;

            let Some(key) = row.get(0) else {
                continue;
            };
            if self.normalize(key) != run_id {
                continue;
            }

            for (metric, value) in headers.iter().zip(row.iter()) {
                metadata.insert(metric, value);
            }
        }

        Ok(metadata)
    }
}
