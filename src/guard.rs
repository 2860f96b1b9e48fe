//! Serialising the downstream pipeline over the snapshots that arrive in its input
//! directory, one at a time.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime};

use crate::errors::*;
use crate::pass_log::PassLog;
use crate::run::markers::{self, Claim};
use crate::snapshot::*;

mod command_pipeline;
pub use command_pipeline::*;

const INPUTS_DIR: &str = "inputs";
const REJECTED_DIR: &str = "rejected";

pub trait Pipeline {
    fn run(&self, snapshot: &SnapshotPaths) -> Result<()>;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    /// Another invocation holds the lock.
    Busy,
    /// Nothing to process.
    Idle,
    Processed { prefix: String },
    Failed { prefix: String, error: String },
}

/// Processes the oldest snapshot in `input_dir` while holding the `process_running` lock.
///
/// Artifacts of a processed snapshot are moved into `<input_dir>/<prefix>/inputs/`, and
/// the `<prefix>` directory is then moved under the output directory if one is set. A
/// snapshot whose pipeline fails stays where it is and is retried on the next poll. A
/// snapshot whose checksum does not match is moved into `<input_dir>/<prefix>/rejected/`
/// so it no longer blocks newer ones.
pub struct PipelineGuard<'a> {
    input_dir: PathBuf,
    output_dir: Option<PathBuf>,
    settle: Duration,
    poll: Duration,
    pipeline: &'a dyn Pipeline,
}

impl<'a> PipelineGuard<'a> {
    const NAME: &'static str = "PipelineGuard";

    pub fn new(input_dir: impl Into<PathBuf>, pipeline: &'a dyn Pipeline) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: None,
            settle: Duration::from_secs(5),
            poll: Duration::from_secs(5),
            pipeline,
        }
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(output_dir.into());
        self
    }

    /// A sequence file counts as settled once it has not been modified for `settle`;
    /// until then it is re-checked every `poll`.
    pub fn with_settle(mut self, settle: Duration, poll: Duration) -> Self {
        self.settle = settle;
        self.poll = poll.max(Duration::from_millis(1));
        self
    }

    pub fn poll(&self, log: &mut PassLog) -> Result<GuardOutcome> {
        if markers::exists(&self.input_dir, markers::PROCESS_RUNNING) {
            log.info(Self::NAME, None, "Another pipeline instance is running.");
            return Ok(GuardOutcome::Busy);
        }

        let Some(snapshot) = oldest_snapshot(&self.input_dir)? else {
            return Ok(GuardOutcome::Idle);
        };

        let Some(lock) = Lock::acquire(&self.input_dir)? else {
            log.info(Self::NAME, None, "Another pipeline instance is running.");
            return Ok(GuardOutcome::Busy);
        };

        let prefix = snapshot.prefix.clone();
        let result = self.process(&snapshot, log);
        lock.release()?;

        match result {
            Ok(()) => Ok(GuardOutcome::Processed { prefix }),
            Err(e) => {
                log.error(&prefix, None, e.to_string());
                Ok(GuardOutcome::Failed {
                    prefix,
                    error: e.to_string(),
                })
            }
        }
    }

    fn process(&self, snapshot: &SnapshotPaths, log: &mut PassLog) -> Result<()> {
        wait_until_settled(&snapshot.fastq, self.settle, self.poll)?;
        if let Err(e) = verify_checksum(snapshot) {
            if let Error::Checksum { .. } = e {
                let rejected = self.input_dir.join(&snapshot.prefix).join(REJECTED_DIR);
                move_files(snapshot, &rejected)?;
                log.warn(
                    &snapshot.prefix,
                    None,
                    format!("Moved to {}.", rejected.display()),
                );
            }
            return Err(e);
        }

        log.info(
            &snapshot.prefix,
            None,
            format!("Running {}.", self.pipeline.name()),
        );
        self.pipeline.run(snapshot)?;

        let published = self.publish(snapshot)?;
        log.info(
            &snapshot.prefix,
            None,
            format!("Pipeline complete, results in {}.", published.display()),
        );

        Ok(())
    }

    fn publish(&self, snapshot: &SnapshotPaths) -> Result<PathBuf> {
        let result_dir = self.input_dir.join(&snapshot.prefix);
        move_files(snapshot, &result_dir.join(INPUTS_DIR))?;

        let Some(output_dir) = &self.output_dir else {
            return Ok(result_dir);
        };

        fs::create_dir_all(output_dir).map_err(|e| Error::file_io(output_dir, e))?;
        let target = output_dir.join(&snapshot.prefix);
        if target.exists() {
            fs::remove_dir_all(&target).map_err(|e| Error::file_io(&target, e))?;
        }
        fs::rename(&result_dir, &target).map_err(|e| Error::file_io(&result_dir, e))?;

        Ok(target)
    }
}

/// Move every artifact of `snapshot` into `dir`, creating it if needed.
fn move_files(snapshot: &SnapshotPaths, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| Error::file_io(dir, e))?;

    for file in snapshot.files() {
        if let Some(name) = file.file_name() {
            let target = dir.join(name);
            fs::rename(file, &target).map_err(|e| Error::file_io(file, e))?;
        }
    }

    Ok(())
}

/// The `process_running` marker, removed again when dropped.
struct Lock {
    dir: PathBuf,
    held: bool,
}

impl Lock {
    fn acquire(dir: &Path) -> Result<Option<Self>> {
        match markers::place(dir, markers::PROCESS_RUNNING)? {
            Claim::Placed => Ok(Some(Self {
                dir: dir.to_owned(),
                held: true,
            })),
            Claim::AlreadyPresent => Ok(None),
        }
    }

    fn release(mut self) -> Result<()> {
        self.held = false;
        markers::remove(&self.dir, markers::PROCESS_RUNNING)
    }
}

impl Drop for Lock {
    fn drop(&mut self) {
        if self.held {
            let _ = markers::remove(&self.dir, markers::PROCESS_RUNNING);
        }
    }
}

/// The snapshot whose sequence file was modified longest ago.
pub fn oldest_snapshot(dir: &Path) -> Result<Option<SnapshotPaths>> {
    let entries = fs::read_dir(dir).map_err(|e| Error::file_io(dir, e))?;
    let mut oldest: Option<(SystemTime, PathBuf)> = None;

    for entry in entries {
        let entry = entry.map_err(|e| Error::file_io(dir, e))?;
        let path = entry.path();
        if !path.is_file() || SnapshotPaths::from_fastq(&path).is_none() {
            continue;
        }

        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .map_err(|e| Error::file_io(&path, e))?;

        let older = match &oldest {
            Some((t, p)) => (modified, &path) < (*t, p),
            None => true,
        };
        if older {
            oldest = Some((modified, path));
        }
    }

    Ok(oldest.and_then(|(_, path)| SnapshotPaths::from_fastq(&path)))
}

/// Block until `path` has gone unmodified for longer than `settle`.
pub fn wait_until_settled(path: &Path, settle: Duration, poll: Duration) -> Result<()> {
    loop {
        let modified = fs::metadata(path)
            .and_then(|m| m.modified())
            .map_err(|e| Error::file_io(path, e))?;
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or_default();

        if age > settle {
            return Ok(());
        }
        thread::sleep(poll);
    }
}

/// Compare the sequence file against the checksum recorded in the stats record.
pub fn verify_checksum(snapshot: &SnapshotPaths) -> Result<()> {
    let stats = StatsRecord::from_path(&snapshot.stats)?;
    let expected = stats.get(CHECKSUM).unwrap_or("<none>").to_owned();
    let found = file_checksum(&snapshot.fastq)?;

    if expected != found {
        return Err(Error::Checksum {
            file: snapshot.fastq.display().to_string(),
            expected,
            found,
        });
    }

    Ok(())
}
