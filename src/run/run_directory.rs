use std::fs;
use std::path::{Path, PathBuf};

use once_cell::unsync::OnceCell;
use regex::Regex;

use crate::errors::*;
use crate::run::*;

pub const SUMMARY_SUFFIX: &str = "sequencing_summary.txt";

const SEQUENCE_SUFFIXES: [&str; 4] = [".fastq", ".fq", ".fastq.gz", ".fq.gz"];

/// One sequencing run: a directory the instrument keeps writing into.
///
/// The start time is read from the instrument metadata at most once per process.
#[derive(Debug)]
pub struct RunDirectory {
    path: PathBuf,
    name: String,
    run_id: String,
    start_time: OnceCell<i64>,
}

impl RunDirectory {
    /// Open a run directory, taking the run identifier from the first match of
    /// `run_id_pattern` in the directory name.
    pub fn new(path: impl Into<PathBuf>, run_id_pattern: &Regex) -> Result<Self> {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let run_id = run_id_pattern
            .find(&name)
            .map(|m| m.as_str().to_owned())
            .ok_or_else(|| Error::RunId {
                name: name.clone(),
                pattern: run_id_pattern.as_str().to_owned(),
            })?;

        Ok(Self {
            path,
            name,
            run_id,
            start_time: OnceCell::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Run start in epoch seconds, read from the instrument metadata on first use.
    pub fn start_time(&self) -> Result<i64> {
        self.start_time
            .get_or_try_init(|| run_start_time(&self.metadata_file()?))
            .copied()
    }

    pub fn metadata_file(&self) -> Result<PathBuf> {
        self.first_file(METADATA_SUFFIX)
    }

    pub fn summary_file(&self) -> Result<PathBuf> {
        self.first_file(SUMMARY_SUFFIX)
    }

    /// Every sequence container currently under the run directory.
    pub fn sequence_containers(&self) -> Result<Vec<PathBuf>> {
        find_files(&self.path, &|name| {
            SEQUENCE_SUFFIXES.iter().any(|s| name.ends_with(s))
        })
    }

    pub fn is_analysis_complete(&self) -> Result<bool> {
        Ok(markers::find_prefixed(&self.path, markers::ANALYSIS_COMPLETE)?.is_some())
    }

    pub fn is_interval_complete(&self, interval: Interval) -> bool {
        markers::exists(&self.path, &markers::complete(interval))
    }

    fn first_file(&self, suffix: &'static str) -> Result<PathBuf> {
        find_files(&self.path, &|name| name.ends_with(suffix))?
            .into_iter()
            .next()
            .ok_or_else(|| Error::MissingFile {
                dir: self.path.display().to_string(),
                pattern: suffix,
            })
    }
}

/// Recursively collect files under `dir` whose file name satisfies `matches`, sorted by path.
pub fn find_files(dir: &Path, matches: &dyn Fn(&str) -> bool) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    collect_files(dir, matches, &mut found)?;
    found.sort();
    Ok(found)
}

fn collect_files(dir: &Path, matches: &dyn Fn(&str) -> bool, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|e| Error::file_io(dir, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| Error::file_io(dir, e))?;
        let file_type = entry.file_type().map_err(|e| Error::file_io(entry.path(), e))?;

        if file_type.is_dir() {
            collect_files(&entry.path(), matches, out)?;
        } else if matches(&entry.file_name().to_string_lossy()) {
            out.push(entry.path());
        }
    }

    Ok(())
}

/// Immediate sub-directories of `root` whose name starts with `prefix`, sorted.
pub fn discover_run_dirs(root: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(root).map_err(|e| Error::file_io(root, e))?;
    let mut dirs = Vec::new();

    for entry in entries {
        let entry = entry.map_err(|e| Error::file_io(root, e))?;
        let is_dir = entry
            .file_type()
            .map_err(|e| Error::file_io(entry.path(), e))?
            .is_dir();

        if is_dir && entry.file_name().to_string_lossy().starts_with(prefix) {
            dirs.push(entry.path());
        }
    }

    dirs.sort();
    Ok(dirs)
}
