use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::errors::*;
use crate::reads::{write_fastq_records, Extraction, ReadWindow, SummaryTable};
use crate::run::Interval;
use crate::snapshot::*;

const FASTQ_EXT: &str = ".fastq";
const STATS_SUFFIX: &str = "_stats.txt";
const SUMMARY_EXT: &str = ".sequencing_summary";
const PARTIAL_EXT: &str = "partial";

/// Where the three artifacts of one snapshot live. All share the `<run>_<N>hr` prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotPaths {
    pub dir: PathBuf,
    pub prefix: String,
    pub fastq: PathBuf,
    pub stats: PathBuf,
    pub summary: PathBuf,
}

impl SnapshotPaths {
    pub fn new(dir: &Path, run_name: &str, interval: Interval) -> Self {
        Self::from_prefix(dir, format!("{run_name}_{interval}"))
    }

    pub fn from_prefix(dir: &Path, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();

        Self {
            dir: dir.to_owned(),
            fastq: dir.join(format!("{prefix}{FASTQ_EXT}")),
            stats: dir.join(format!("{prefix}{STATS_SUFFIX}")),
            summary: dir.join(format!("{prefix}{SUMMARY_EXT}")),
            prefix,
        }
    }

    /// Derive the sibling artifacts from a sequence file name.
    pub fn from_fastq(fastq: &Path) -> Option<Self> {
        let name = fastq.file_name()?.to_str()?;
        let prefix = name.strip_suffix(FASTQ_EXT)?;
        let dir = fastq.parent().unwrap_or_else(|| Path::new(""));

        Some(Self::from_prefix(dir, prefix))
    }

    /// The artifacts in transfer order. The sequence file goes last since its arrival
    /// is what downstream consumers key on.
    pub fn files(&self) -> [&Path; 3] {
        [&self.summary, &self.stats, &self.fastq]
    }

    pub fn all_exist(&self) -> bool {
        self.files().iter().all(|f| f.is_file())
    }
}

/// Everything computed for one run and interval.
pub struct Snapshot<'a> {
    pub run_name: &'a str,
    pub interval: Interval,
    pub start_time: i64,
    pub summary: &'a SummaryTable,
    pub window: &'a ReadWindow,
    pub extraction: &'a Extraction,
}

impl<'a> Snapshot<'a> {
    /// Merge the recorded run metadata with the computed aggregates.
    pub fn stats(&self, recorded: StatsRecord, checksum: &str) -> StatsRecord {
        let mut stats = recorded;

        stats.insert(RUN_NAME, self.run_name);
        stats.insert(DATETIME, self.start_time);
        stats.insert(TOTAL_READS, self.window.total_reads);
        stats.insert(ANALYSED_READS, self.window.passed.len());
        stats.insert(MEAN_READ_LENGTH, format!("{:.2}", self.extraction.mean_length));
        stats.insert(MEAN_QSCORE, format!("{:.2}", self.window.mean_qscore));
        stats.insert(MISSING_READS, self.extraction.missing.len());
        stats.insert(CHECKSUM, checksum);
        stats.insert(HOUR, self.interval.hours());

        stats
    }
}

/// Write the summary copy, the sequence subset, and the stats record, in that order.
///
/// Each artifact becomes visible under its final name only once it is complete, so the
/// stats record existing implies the other two do. Existing artifacts are overwritten.
pub fn write_snapshot(
    paths: &SnapshotPaths,
    snapshot: &Snapshot<'_>,
    recorded: StatsRecord,
) -> Result<StatsRecord> {
    fs::create_dir_all(&paths.dir).map_err(|e| Error::file_io(&paths.dir, e))?;

    write_atomic(&paths.summary, snapshot.summary.content().as_bytes())?;

    let mut fastq = Vec::new();
    write_fastq_records(&mut fastq, &snapshot.extraction.records)
        .map_err(|e| Error::file_io(&paths.fastq, e))?;
    write_atomic(&paths.fastq, &fastq)?;

    let stats = snapshot.stats(recorded, &sha256_hex(&fastq));
    write_atomic(&paths.stats, stats.to_tsv().as_bytes())?;

    Ok(stats)
}

/// Temporary name used while `path` is being written.
pub fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(PARTIAL_EXT);
    path.with_file_name(name)
}

/// Write `bytes` next to `path` and rename into place.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let partial = partial_path(path);

    let write = || -> std::io::Result<()> {
        let mut writer = BufWriter::new(File::create(&partial)?);
        writer.write_all(bytes)?;
        writer.into_inner()?.sync_all()?;
        fs::rename(&partial, path)
    };

    write().map_err(|e| {
        let _ = fs::remove_file(&partial);
        Error::file_io(path, e)
    })
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

pub fn file_checksum(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| Error::file_io(path, e))?;
    Ok(sha256_hex(&bytes))
}
