use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use chrono::Local;
use clap::{Parser, Subcommand};
use colored::Colorize;

use seqsnap::errors::*;
use seqsnap::handoff::HandOff;
use seqsnap::run::SystemClock;
use seqsnap::*;

/// Interval snapshots of sequencing runs, and the guard that feeds them to the
/// downstream pipeline. Each invocation does one pass and exits.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    #[clap(subcommand)]
    mode: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Visit every run once and write the snapshots that are due.
    Watch {
        /// YAML configuration with a `watch` section.
        config: PathBuf,
    },
    /// Hand the oldest waiting snapshot to the downstream pipeline.
    Guard {
        /// YAML configuration with a `guard` section.
        config: PathBuf,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();
    let config_path = match &args.mode {
        Mode::Watch { config } | Mode::Guard { config } => config,
    };

    let config = match Config::from_file(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {e}", "error:".red().bold());
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(config.log_dir.as_deref()) {
        eprintln!("{} {e}", "error:".red().bold());
        return ExitCode::FAILURE;
    }

    let result = match args.mode {
        Mode::Watch { .. } => watch(&config),
        Mode::Guard { .. } => guard(&config),
    };

    match result {
        Ok(summary) => {
            println!("{summary}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("{} {e}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn init_logging(log_dir: Option<&Path>) -> Result<()> {
    let builder = tracing_subscriber::fmt().with_target(false);

    let Some(log_dir) = log_dir else {
        builder.with_writer(std::io::stderr).init();
        return Ok(());
    };

    fs::create_dir_all(log_dir).map_err(|e| Error::file_io(log_dir, e))?;
    let path = log_dir.join(format!("Pipeline-{}.log", Local::now().format("%Y%m%d")));
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| Error::file_io(&path, e))?;

    builder.with_ansi(false).with_writer(Mutex::new(file)).init();
    Ok(())
}

fn watch(config: &Config) -> Result<String> {
    let Some(watch) = &config.watch else {
        return Err(missing_section("watch"));
    };

    let registry = watch.registry();
    let handoff: Box<dyn HandOff> = watch.handoff();
    let coordinator = Coordinator::new(watch, registry.as_ref(), handoff.as_ref(), &SystemClock)?;

    let mut log = PassLog::new();
    let report = coordinator.run_pass(&mut log)?;

    let summary = report.summary();
    Ok(if report.failed() > 0 {
        summary.yellow().to_string()
    } else {
        summary.green().to_string()
    })
}

fn guard(config: &Config) -> Result<String> {
    let Some(guard) = &config.guard else {
        return Err(missing_section("guard"));
    };

    let pipeline = guard.pipeline()?;
    let mut pipeline_guard = PipelineGuard::new(&guard.input_dir, &pipeline)
        .with_settle(guard.settle(), guard.poll());
    if let Some(output_dir) = &guard.output_dir {
        pipeline_guard = pipeline_guard.with_output_dir(output_dir);
    }

    let mut log = PassLog::new();
    let outcome = pipeline_guard.poll(&mut log)?;

    Ok(match outcome {
        GuardOutcome::Busy => "pipeline busy".yellow().to_string(),
        GuardOutcome::Idle => "nothing to process".normal().to_string(),
        GuardOutcome::Processed { prefix } => format!("processed {prefix}").green().to_string(),
        GuardOutcome::Failed { prefix, .. } => format!("failed {prefix}").red().to_string(),
    })
}

fn missing_section(section: &str) -> Error {
    Error::Config {
        file: "configuration".to_owned(),
        reason: format!("no `{section}` section"),
    }
}
