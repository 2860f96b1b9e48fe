//! One coordination pass over every run directory under the sequencing output root.
//!
//! For each run, intervals are visited in ascending order. An interval whose completion
//! marker exists is skipped, the first interval that is not yet due ends the run's turn,
//! and a due interval is extracted, written, handed off, and marked complete. Once every
//! interval is complete the run gets its terminal marker and is never visited again.
//!
//! Failures are confined to the run they occur in: they are logged against the run and
//! interval, and the pass moves on to the next run.

use std::fs;
use std::path::PathBuf;

use regex::Regex;

use crate::config::WatchConfig;
use crate::errors::*;
use crate::handoff::HandOff;
use crate::pass_log::PassLog;
use crate::reads::*;
use crate::run::markers::{self, Claim};
use crate::run::*;
use crate::snapshot::*;

#[derive(Debug, Clone, PartialEq)]
pub struct IntervalStats {
    pub total_reads: usize,
    pub analysed_reads: usize,
    pub missing_reads: usize,
    /// An earlier pass started this interval and did not finish it.
    pub resumed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IntervalOutcome {
    AlreadyDone,
    NotDue { due_at: i64 },
    Processed(IntervalStats),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The terminal marker was already present.
    AlreadyComplete,
    /// Some interval is not due yet.
    Pending(Vec<(Interval, IntervalOutcome)>),
    /// Every interval is done and the terminal marker was placed in this pass.
    Completed(Vec<(Interval, IntervalOutcome)>),
    Failed {
        intervals: Vec<(Interval, IntervalOutcome)>,
        error: String,
    },
}

impl RunOutcome {
    pub fn intervals(&self) -> &[(Interval, IntervalOutcome)] {
        match self {
            RunOutcome::AlreadyComplete => &[],
            RunOutcome::Pending(i) | RunOutcome::Completed(i) => i,
            RunOutcome::Failed { intervals, .. } => intervals,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub run: String,
    pub outcome: RunOutcome,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassReport {
    pub runs: Vec<RunReport>,
}

impl PassReport {
    pub fn run(&self, name: &str) -> Option<&RunOutcome> {
        self.runs.iter().find(|r| r.run == name).map(|r| &r.outcome)
    }

    pub fn processed(&self) -> usize {
        self.runs
            .iter()
            .flat_map(|r| r.outcome.intervals())
            .filter(|(_, o)| matches!(o, IntervalOutcome::Processed(_)))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.runs
            .iter()
            .filter(|r| matches!(r.outcome, RunOutcome::Failed { .. }))
            .count()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} runs seen, {} snapshots written, {} runs failed",
            self.runs.len(),
            self.processed(),
            self.failed()
        )
    }
}

pub struct Coordinator<'a> {
    sequencing_output: PathBuf,
    run_prefix: String,
    run_id_pattern: Regex,
    intervals: Vec<Interval>,
    processed_files: PathBuf,
    registry: &'a dyn RunRegistry,
    handoff: &'a dyn HandOff,
    clock: &'a dyn Clock,
}

impl<'a> Coordinator<'a> {
    pub fn new(
        config: &WatchConfig,
        registry: &'a dyn RunRegistry,
        handoff: &'a dyn HandOff,
        clock: &'a dyn Clock,
    ) -> Result<Self> {
        let run_id_pattern = config.run_id_regex().map_err(|e| Error::Config {
            file: "watch.run_id_pattern".to_owned(),
            reason: e.to_string(),
        })?;

        // `WatchConfig` fields are public, so the config may not have been validated.
        let mut intervals = config.intervals.clone();
        intervals.sort();
        intervals.dedup();

        Ok(Self {
            sequencing_output: config.sequencing_output.clone(),
            run_prefix: config.run_prefix.clone(),
            run_id_pattern,
            intervals,
            processed_files: config.processed_files.clone(),
            registry,
            handoff,
            clock,
        })
    }

    /// Visit every run once. Only failing to list the sequencing output root, or to
    /// create the processed files directory, fails the whole pass.
    pub fn run_pass(&self, log: &mut PassLog) -> Result<PassReport> {
        fs::create_dir_all(&self.processed_files)
            .map_err(|e| Error::file_io(&self.processed_files, e))?;

        let dirs = discover_run_dirs(&self.sequencing_output, &self.run_prefix)?;
        let mut report = PassReport::default();

        for path in dirs {
            let run = match RunDirectory::new(&path, &self.run_id_pattern) {
                Ok(run) => run,
                Err(e) => {
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    log.error(&name, None, e.to_string());
                    report.runs.push(RunReport {
                        run: name,
                        outcome: RunOutcome::Failed {
                            intervals: Vec::new(),
                            error: e.to_string(),
                        },
                    });
                    continue;
                }
            };

            let outcome = self.process_run(&run, log);
            report.runs.push(RunReport {
                run: run.name().to_owned(),
                outcome,
            });
        }

        Ok(report)
    }

    pub fn process_run(&self, run: &RunDirectory, log: &mut PassLog) -> RunOutcome {
        match run.is_analysis_complete() {
            Ok(true) => return RunOutcome::AlreadyComplete,
            Ok(false) => {}
            Err(e) => {
                log.error(run.name(), None, e.to_string());
                return RunOutcome::Failed {
                    intervals: Vec::new(),
                    error: e.to_string(),
                };
            }
        }

        let mut intervals = Vec::with_capacity(self.intervals.len());

        for &interval in &self.intervals {
            match self.process_interval(run, interval, log) {
                Ok(outcome) => {
                    let not_due = matches!(outcome, IntervalOutcome::NotDue { .. });
                    intervals.push((interval, outcome));
                    if not_due {
                        return RunOutcome::Pending(intervals);
                    }
                }
                Err(e) => {
                    log.error(run.name(), Some(interval), e.to_string());
                    return RunOutcome::Failed {
                        intervals,
                        error: e.to_string(),
                    };
                }
            }
        }

        let terminal = markers::analysis_complete(self.clock.now());
        match markers::place(run.path(), &terminal) {
            Ok(_) => {
                log.info(run.name(), None, "Analysis complete.");
                RunOutcome::Completed(intervals)
            }
            Err(e) => {
                log.error(run.name(), None, e.to_string());
                RunOutcome::Failed {
                    intervals,
                    error: e.to_string(),
                }
            }
        }
    }

    /// Produce the snapshot of `run` at `interval` unless it is already done or not due.
    pub fn process_interval(
        &self,
        run: &RunDirectory,
        interval: Interval,
        log: &mut PassLog,
    ) -> Result<IntervalOutcome> {
        if run.is_interval_complete(interval) {
            return Ok(IntervalOutcome::AlreadyDone);
        }

        let start_time = run.start_time()?;
        if !is_due(start_time, interval, self.clock) {
            return Ok(IntervalOutcome::NotDue {
                due_at: due_at(start_time, interval),
            });
        }

        let resumed = markers::place(run.path(), &markers::started(interval))? == Claim::AlreadyPresent;
        if resumed {
            log.warn(
                run.name(),
                Some(interval),
                "Interval was started by an earlier pass that did not finish, extracting again.",
            );
        }
        log.info(run.name(), Some(interval), "Processing sequencing files.");

        let paths = SnapshotPaths::new(&self.processed_files, run.name(), interval);
        let stats = self
            .extract(run, interval, start_time, &paths, log)
            .and_then(|stats| {
                self.handoff.transfer(&paths, interval)?;
                Ok(stats)
            })
            .map_err(|e| {
                remove_snapshot(&paths);
                e
            })?;
        log.info(
            run.name(),
            Some(interval),
            format!("Snapshot handed off to {}.", self.handoff.destination()),
        );

        markers::place(run.path(), &markers::complete(interval))?;
        log.info(run.name(), Some(interval), "Processing completed.");

        Ok(IntervalOutcome::Processed(IntervalStats { resumed, ..stats }))
    }

    fn extract(
        &self,
        run: &RunDirectory,
        interval: Interval,
        start_time: i64,
        paths: &SnapshotPaths,
        log: &mut PassLog,
    ) -> Result<IntervalStats> {
        let summary = SummaryTable::from_path(&run.summary_file()?)?;
        let window = summary.select(interval.seconds() as f64);

        if window.malformed_rows > 0 {
            log.warn(
                run.name(),
                Some(interval),
                format!("Skipped {} malformed summary rows.", window.malformed_rows),
            );
        }
        log.info(
            run.name(),
            Some(interval),
            format!(
                "{} reads in window, {} passed filtering.",
                window.total_reads,
                window.passed.len()
            ),
        );

        let extraction = if window.passed.is_empty() {
            Extraction::default()
        } else {
            extract_reads(run.sequence_containers()?, &window.passed)?
        };

        for corrupt in &extraction.corrupt_containers {
            log.warn(
                run.name(),
                Some(interval),
                format!(
                    "Stopped reading {} at record {}: {}",
                    corrupt.path.display(),
                    corrupt.idx,
                    corrupt.reason
                ),
            );
        }

        if !extraction.missing.is_empty() {
            log.warn(
                run.name(),
                Some(interval),
                format!(
                    "The following {} reads were not found: {}",
                    extraction.missing.len(),
                    extraction.missing.join(", ")
                ),
            );
        }

        let recorded = self.registry.lookup(run.run_id())?;
        let snapshot = Snapshot {
            run_name: run.name(),
            interval,
            start_time,
            summary: &summary,
            window: &window,
            extraction: &extraction,
        };
        write_snapshot(paths, &snapshot, recorded)?;

        Ok(IntervalStats {
            total_reads: window.total_reads,
            analysed_reads: window.passed.len(),
            missing_reads: extraction.missing.len(),
            resumed: false,
        })
    }
}

fn remove_snapshot(paths: &SnapshotPaths) {
    for file in paths.files() {
        let _ = fs::remove_file(file);
        let _ = fs::remove_file(partial_path(file));
    }
}
