use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use seqsnap::config::WatchConfig;
use seqsnap::coordinator::*;
use seqsnap::errors::*;
use seqsnap::handoff::*;
use seqsnap::pass_log::Severity;
use seqsnap::run::{markers, FixedClock, Interval};
use seqsnap::snapshot::*;
use seqsnap::{Config, PassLog};

/// 2020-10-01T09:30:00Z
const START: i64 = 1_601_544_600;
const ONE_HOUR: i64 = 3600;

const SUMMARY: &str = "filename\tread_id\tpasses_filtering\tstart_time\tmean_qscore_template\n\
                       a_0.fastq\tr1\tTRUE\t100.5\t10.0\n\
                       a_0.fastq\tr2\tFALSE\t200.0\t7.0\n\
                       a_0.fastq\tr3\tTRUE\t7000.0\t12.0\n\
                       a_1.fastq\tr4\tTRUE\t7300.0\t11.0\n";

const FASTQ_0: &str = "@r1 runid=x ch=1\nACGTACGT\n+\nIIIIIIII\n\
                       @r2 runid=x ch=2\nACG\n+\nIII\n\
                       @r3 runid=x ch=3\nACGTAC\n+\nIIIIII\n";

const FASTQ_1: &str = "@r4 runid=x ch=4\nAC\n+\nII\n";

fn h(hours: u32) -> Interval {
    Interval::from_hours(hours)
}

/// A run directory laid out the way the instrument writes it.
fn make_run(root: &Path, name: &str, with_metadata: bool) -> PathBuf {
    let run = root.join(name);
    fs::create_dir_all(run.join("fast5_pass")).unwrap();
    fs::create_dir_all(run.join("fastq_pass")).unwrap();

    if with_metadata {
        let mut fast5 = b"\x89HDF\r\n\x1a\n\x00\x00".to_vec();
        fast5.extend_from_slice(b"exp_start_time\x00\x00\x14\x002020-10-01T09:30:00Z\x00");
        fs::write(run.join("fast5_pass/FGD_abc_0.fast5"), fast5).unwrap();
    }

    fs::write(run.join("FGD_sequencing_summary.txt"), SUMMARY).unwrap();
    fs::write(run.join("fastq_pass/a_0.fastq"), FASTQ_0).unwrap();
    fs::write(run.join("fastq_pass/a_1.fastq"), FASTQ_1).unwrap();
    fs::write(run.join("fastq_pass/a_2.fastq"), b"").unwrap();

    run
}

fn watch_config(root: &Path, out: &Path, intervals: &str) -> WatchConfig {
    let yaml = format!(
        "watch:\n  sequencing_output: \"{}\"\n  processed_files: \"{}\"\n  intervals: {intervals}\n",
        root.display(),
        out.display()
    );
    Config::parse("test", &yaml).unwrap().watch.unwrap()
}

fn pass_with(
    config: &WatchConfig,
    registry: &dyn RunRegistry,
    handoff: &dyn HandOff,
    now: i64,
) -> (PassReport, PassLog) {
    let clock = FixedClock(now);
    let coordinator = Coordinator::new(config, registry, handoff, &clock).unwrap();
    let mut log = PassLog::new();
    let report = coordinator.run_pass(&mut log).unwrap();
    (report, log)
}

fn pass(config: &WatchConfig, now: i64) -> (PassReport, PassLog) {
    pass_with(config, &EmptyRegistry, &NoHandOff, now)
}

fn processed(outcome: &IntervalOutcome) -> &IntervalStats {
    match outcome {
        IntervalOutcome::Processed(stats) => stats,
        other => panic!("expected a processed interval, got {other:?}"),
    }
}

struct FailingHandOff;

impl HandOff for FailingHandOff {
    fn transfer(&self, _snapshot: &SnapshotPaths, interval: Interval) -> Result<()> {
        Err(Error::HandOff {
            context: "FailingHandOff",
            interval,
            reason: "connection refused".to_owned(),
        })
    }

    fn destination(&self) -> String {
        "nowhere".to_owned()
    }

    fn name(&self) -> &'static str {
        "FailingHandOff"
    }
}

#[test]
fn test_due_interval_is_extracted_and_handed_off() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("data");
    let out = dir.path().join("processed");
    let dest = dir.path().join("pipeline_input");
    let run = make_run(&root, "16S_FGD0001", true);

    let config = watch_config(&root, &out, "[2]");
    let handoff = CopyHandOff::new(&dest);
    let (report, log) = pass_with(&config, &EmptyRegistry, &handoff, START + 2 * ONE_HOUR);

    let Some(RunOutcome::Completed(intervals)) = report.run("16S_FGD0001") else {
        panic!("unexpected report {report:?}");
    };
    assert_eq!(intervals.len(), 1);
    assert_eq!(
        processed(&intervals[0].1),
        &IntervalStats {
            total_reads: 3,
            analysed_reads: 2,
            missing_reads: 0,
            resumed: false,
        }
    );
    assert_eq!(log.with_severity(Severity::Warning).count(), 0);

    let paths = SnapshotPaths::new(&out, "16S_FGD0001", h(2));
    assert!(paths.all_exist());
    assert_eq!(
        fs::read_to_string(&paths.fastq).unwrap(),
        "@r1 runid=x ch=1\nACGTACGT\n+\nIIIIIIII\n@r3 runid=x ch=3\nACGTAC\n+\nIIIIII\n"
    );
    assert_eq!(fs::read_to_string(&paths.summary).unwrap(), SUMMARY);

    let stats = StatsRecord::from_path(&paths.stats).unwrap();
    assert_eq!(stats.get(RUN_NAME), Some("16S_FGD0001"));
    assert_eq!(stats.get(TOTAL_READS), Some("3"));
    assert_eq!(stats.get(ANALYSED_READS), Some("2"));
    assert_eq!(stats.get(MEAN_READ_LENGTH), Some("7.00"));
    assert_eq!(stats.get(MEAN_QSCORE), Some("11.00"));
    assert_eq!(stats.get(MISSING_READS), Some("0"));
    assert_eq!(stats.get(HOUR), Some("2"));

    let copied = SnapshotPaths::new(&dest, "16S_FGD0001", h(2));
    assert!(copied.all_exist());

    assert!(markers::exists(&run, "2hr_started"));
    assert!(markers::exists(&run, "2hr_complete"));
    assert!(markers::find_prefixed(&run, markers::ANALYSIS_COMPLETE)
        .unwrap()
        .is_some());
}

#[test]
fn test_interval_is_not_due_one_second_early() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("data");
    let out = dir.path().join("processed");
    let run = make_run(&root, "16S_FGD0001", true);

    let config = watch_config(&root, &out, "[2]");
    let (report, _) = pass(&config, START + 2 * ONE_HOUR - 1);

    assert_eq!(
        report.run("16S_FGD0001"),
        Some(&RunOutcome::Pending(vec![(
            h(2),
            IntervalOutcome::NotDue {
                due_at: START + 2 * ONE_HOUR
            }
        )]))
    );
    assert!(!markers::exists(&run, "2hr_started"));
    assert!(!SnapshotPaths::new(&out, "16S_FGD0001", h(2)).fastq.exists());
}

#[test]
fn test_completed_interval_is_never_rewritten() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("data");
    let out = dir.path().join("processed");
    let run = make_run(&root, "16S_FGD0001", true);
    let config = watch_config(&root, &out, "[4, 2]");

    let (report, _) = pass(&config, START + 2 * ONE_HOUR);
    let outcome = report.run("16S_FGD0001").unwrap();
    assert!(matches!(outcome, RunOutcome::Pending(_)));
    assert_eq!(outcome.intervals().len(), 2);
    assert!(matches!(
        outcome.intervals()[1],
        (i, IntervalOutcome::NotDue { .. }) if i == h(4)
    ));

    let paths = SnapshotPaths::new(&out, "16S_FGD0001", h(2));
    let before = paths
        .files()
        .map(|f| fs::read(f).unwrap());

    // the instrument keeps writing
    let mut summary = SUMMARY.to_owned();
    summary.push_str("a_2.fastq\tr5\tTRUE\t50.0\t9.0\n");
    fs::write(run.join("FGD_sequencing_summary.txt"), &summary).unwrap();

    let (report, _) = pass(&config, START + 2 * ONE_HOUR + 60);
    assert_eq!(
        report.run("16S_FGD0001").unwrap().intervals()[0],
        (h(2), IntervalOutcome::AlreadyDone)
    );
    assert_eq!(paths.files().map(|f| fs::read(f).unwrap()), before);

    let (report, log) = pass(&config, START + 4 * ONE_HOUR);
    let Some(RunOutcome::Completed(intervals)) = report.run("16S_FGD0001") else {
        panic!("unexpected report {report:?}");
    };
    assert_eq!(intervals[0], (h(2), IntervalOutcome::AlreadyDone));
    let stats = processed(&intervals[1].1);
    assert_eq!(stats.total_reads, 5);
    assert_eq!(stats.analysed_reads, 4);
    assert_eq!(stats.missing_reads, 1);

    let warnings = log
        .with_severity(Severity::Warning)
        .map(|e| e.message.clone())
        .collect::<Vec<_>>();
    assert_eq!(warnings, vec!["The following 1 reads were not found: r5"]);
    assert_eq!(paths.files().map(|f| fs::read(f).unwrap()), before);

    let (report, _) = pass(&config, START + 10 * ONE_HOUR);
    assert_eq!(
        report.run("16S_FGD0001"),
        Some(&RunOutcome::AlreadyComplete)
    );
}

#[test]
fn test_terminal_marker_excludes_run() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("data");
    let out = dir.path().join("processed");
    let run = make_run(&root, "16S_FGD0001", false);
    markers::place(&run, "analysis_complete_20201001-113000").unwrap();

    let config = watch_config(&root, &out, "[2]");
    let (report, log) = pass(&config, START + 2 * ONE_HOUR);

    assert_eq!(
        report.run("16S_FGD0001"),
        Some(&RunOutcome::AlreadyComplete)
    );
    assert!(log.entries().is_empty());
    assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
}

#[test]
fn test_interrupted_interval_is_resumed() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("data");
    let out = dir.path().join("processed");
    let run = make_run(&root, "16S_FGD0001", true);
    markers::place(&run, "2hr_started").unwrap();

    let config = watch_config(&root, &out, "[2]");
    let (report, log) = pass(&config, START + 3 * ONE_HOUR);

    let outcome = report.run("16S_FGD0001").unwrap();
    assert!(processed(&outcome.intervals()[0].1).resumed);
    assert_eq!(log.with_severity(Severity::Warning).count(), 1);
    assert!(markers::exists(&run, "2hr_complete"));
}

#[test]
fn test_failing_runs_do_not_block_others() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("data");
    let out = dir.path().join("processed");
    make_run(&root, "16S_FGD0001", false);
    make_run(&root, "16S_FGD0002", true);
    make_run(&root, "16S_unlabelled", true);
    make_run(&root, "other_FGD0003", true);

    let config = watch_config(&root, &out, "[2]");
    let (report, log) = pass(&config, START + 2 * ONE_HOUR);

    assert_eq!(report.runs.len(), 3);
    assert_eq!(report.failed(), 2);
    assert_eq!(report.processed(), 1);
    assert!(matches!(
        report.run("16S_FGD0001"),
        Some(RunOutcome::Failed { .. })
    ));
    assert!(matches!(
        report.run("16S_FGD0002"),
        Some(RunOutcome::Completed(_))
    ));
    assert!(matches!(
        report.run("16S_unlabelled"),
        Some(RunOutcome::Failed { .. })
    ));

    let failed_runs = log
        .with_severity(Severity::Error)
        .map(|e| e.run.as_str())
        .collect::<Vec<_>>();
    assert_eq!(failed_runs, vec!["16S_FGD0001", "16S_unlabelled"]);

    assert!(!SnapshotPaths::new(&out, "16S_FGD0001", h(2)).fastq.exists());
    assert!(SnapshotPaths::new(&out, "16S_FGD0002", h(2)).all_exist());
}

#[test]
fn test_failed_handoff_leaves_no_artifacts() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("data");
    let out = dir.path().join("processed");
    let run = make_run(&root, "16S_FGD0001", true);
    let config = watch_config(&root, &out, "[2]");

    let (report, log) = pass_with(&config, &EmptyRegistry, &FailingHandOff, START + 2 * ONE_HOUR);
    assert!(matches!(
        report.run("16S_FGD0001"),
        Some(RunOutcome::Failed { .. })
    ));
    let error = log.with_severity(Severity::Error).next().unwrap();
    assert_eq!(error.interval, Some(h(2)));

    assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
    assert!(markers::exists(&run, "2hr_started"));
    assert!(!markers::exists(&run, "2hr_complete"));

    let (report, _) = pass(&config, START + 2 * ONE_HOUR);
    let outcome = report.run("16S_FGD0001").unwrap();
    assert!(matches!(outcome, RunOutcome::Completed(_)));
    assert!(processed(&outcome.intervals()[0].1).resumed);
}

#[test]
fn test_registry_metadata_is_merged() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("data");
    let out = dir.path().join("processed");
    make_run(&root, "16S_FGD0001", true);

    let registry_file = dir.path().join("run_stats.tsv");
    fs::write(
        &registry_file,
        "Run ID\tSample\tOperator\nFDG0001\tS-01\tgrid\nFGD0002\tS-02\tgrid\n",
    )
    .unwrap();
    let registry = TsvRegistry::new(&registry_file).with_alias("FDG", "FGD");

    let config = watch_config(&root, &out, "[2]");
    pass_with(&config, &registry, &NoHandOff, START + 2 * ONE_HOUR);

    let stats =
        StatsRecord::from_path(&SnapshotPaths::new(&out, "16S_FGD0001", h(2)).stats).unwrap();
    assert_eq!(stats.get("Sample"), Some("S-01"));
    assert_eq!(stats.get("Operator"), Some("grid"));
    assert_eq!(stats.get(RUN_NAME), Some("16S_FGD0001"));
    assert_eq!(stats.iter().next().map(|(m, _)| m), Some("Run ID"));
}

#[test]
fn test_interval_without_passed_reads_still_completes() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("data");
    let out = dir.path().join("processed");
    let run = make_run(&root, "16S_FGD0001", true);
    fs::write(
        run.join("FGD_sequencing_summary.txt"),
        "read_id\tpasses_filtering\tstart_time\tmean_qscore_template\n\
         r1\tFALSE\t100.5\t10.0\n\
         r2\tFALSE\t200.0\t7.0\n\
         r4\tTRUE\t7300.0\t11.0\n",
    )
    .unwrap();

    let config = watch_config(&root, &out, "[2]");
    let (report, log) = pass(&config, START + 2 * ONE_HOUR);

    let Some(RunOutcome::Completed(intervals)) = report.run("16S_FGD0001") else {
        panic!("unexpected report {report:?}");
    };
    assert_eq!(
        processed(&intervals[0].1),
        &IntervalStats {
            total_reads: 2,
            analysed_reads: 0,
            missing_reads: 0,
            resumed: false,
        }
    );
    assert_eq!(log.with_severity(Severity::Error).count(), 0);

    let paths = SnapshotPaths::new(&out, "16S_FGD0001", h(2));
    assert!(paths.all_exist());
    assert_eq!(fs::metadata(&paths.fastq).unwrap().len(), 0);

    let stats = StatsRecord::from_path(&paths.stats).unwrap();
    assert_eq!(stats.get(TOTAL_READS), Some("2"));
    assert_eq!(stats.get(ANALYSED_READS), Some("0"));
    assert_eq!(stats.get(MEAN_READ_LENGTH), Some("0.00"));
    assert_eq!(stats.get(MEAN_QSCORE), Some("0.00"));

    assert!(markers::exists(&run, "2hr_complete"));
    assert!(markers::find_prefixed(&run, markers::ANALYSIS_COMPLETE)
        .unwrap()
        .is_some());
}

#[test]
fn test_truncated_container_is_reported_not_fatal() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("data");
    let out = dir.path().join("processed");
    let run = make_run(&root, "16S_FGD0001", true);
    fs::write(
        run.join("fastq_pass/a_0.fastq"),
        "@r1 runid=x ch=1\nACGTACGT\n+\nIIIIIIII\n@r2 runid=x ch=2\nAC",
    )
    .unwrap();

    let config = watch_config(&root, &out, "[2]");
    let (report, log) = pass(&config, START + 2 * ONE_HOUR);

    let Some(RunOutcome::Completed(intervals)) = report.run("16S_FGD0001") else {
        panic!("unexpected report {report:?}");
    };
    let stats = processed(&intervals[0].1);
    assert_eq!(stats.analysed_reads, 1);
    assert_eq!(stats.missing_reads, 1);

    let warnings = log
        .with_severity(Severity::Warning)
        .map(|entry| entry.message.clone())
        .collect::<Vec<_>>();
    assert!(warnings.iter().any(|w| w.contains("a_0.fastq")));
    assert!(warnings.iter().any(|w| w.contains("r3")));
    assert!(markers::exists(&run, "2hr_complete"));
}
