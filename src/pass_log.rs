use std::fmt;

use tracing::{error, info, warn};

use crate::run::Interval;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub severity: Severity,
    pub run: String,
    pub interval: Option<Interval>,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}\t{}\t", self.severity, self.run)?;
        match self.interval {
            Some(interval) => write!(f, "{interval}")?,
            None => f.write_str("-")?,
        }
        write!(f, "\t{}", self.message)
    }
}

/// The reporting capability handed to one coordination pass or guard poll.
///
/// Every entry is emitted as a `tracing` event carrying `run` and `interval` fields,
/// and kept so the caller can inspect what happened once the pass is over.
#[derive(Debug, Default)]
pub struct PassLog {
    entries: Vec<LogEntry>,
}

impl PassLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, run: &str, interval: Option<Interval>, message: impl Into<String>) {
        self.record(Severity::Info, run, interval, message.into());
    }

    pub fn warn(&mut self, run: &str, interval: Option<Interval>, message: impl Into<String>) {
        self.record(Severity::Warning, run, interval, message.into());
    }

    pub fn error(&mut self, run: &str, interval: Option<Interval>, message: impl Into<String>) {
        self.record(Severity::Error, run, interval, message.into());
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn with_severity(&self, severity: Severity) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().filter(move |e| e.severity == severity)
    }

    fn record(&mut self, severity: Severity, run: &str, interval: Option<Interval>, message: String) {
        let label = interval.map_or_else(|| "-".to_owned(), |i| i.to_string());

        match severity {
            Severity::Info => info!(run, interval = %label, "{message}"),
            Severity::Warning => warn!(run, interval = %label, "{message}"),
            Severity::Error => error!(run, interval = %label, "{message}"),
        }

        self.entries.push(LogEntry {
            severity,
            run: run.to_owned(),
            interval,
            message,
        });
    }
}
