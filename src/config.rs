//! Deployment configuration, read from a YAML file.
//!
//! ```yaml
//! log_dir: /data/16S-Pipeline/log_files
//! watch:
//!   sequencing_output: /data
//!   processed_files: /data/16S-Pipeline/pipeline_input
//!   run_registry: /home/grid/run_stats.tsv
//!   intervals: [2]
//!   handoff:
//!     kind: scp
//!     username: nanopore
//!     host: 10.161.19.235
//!     path: /home/nanopore/16S_Pipeline/pipeline_input
//!     password_file: /data/passwd.txt
//! guard:
//!   input_dir: /home/nanopore/16S_Pipeline/pipeline_input
//!   output_dir: /home/nanopore/16S_Pipeline/pipeline_output
//!   settle_secs: 5
//!   command: [run_pipeline, --prefix, "{prefix}", --fastq, "{fastq}",
//!             --sequencing_summary, "{summary}", --quality_stats, "{stats}"]
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;

use crate::errors::*;
use crate::guard::CommandPipeline;
use crate::handoff::*;
use crate::run::Interval;
use crate::snapshot::{EmptyRegistry, RunRegistry, TsvRegistry};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    #[serde(default)]
    pub watch: Option<WatchConfig>,
    #[serde(default)]
    pub guard: Option<GuardConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchConfig {
    pub sequencing_output: PathBuf,
    #[serde(default = "default_run_prefix")]
    pub run_prefix: String,
    #[serde(default = "default_run_id_pattern")]
    pub run_id_pattern: String,
    pub intervals: Vec<Interval>,
    pub processed_files: PathBuf,
    #[serde(default)]
    pub run_registry: Option<PathBuf>,
    #[serde(default = "default_registry_aliases")]
    pub registry_aliases: BTreeMap<String, String>,
    #[serde(default)]
    pub handoff: HandOffConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum HandOffConfig {
    #[default]
    None,
    Copy {
        destination: PathBuf,
    },
    Scp {
        username: String,
        host: String,
        path: String,
        password_file: PathBuf,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GuardConfig {
    pub input_dir: PathBuf,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default = "default_settle_secs")]
    pub settle_secs: u64,
    #[serde(default)]
    pub poll_secs: Option<u64>,
    pub command: Vec<String>,
}

fn default_run_prefix() -> String {
    "16S_".to_owned()
}

fn default_run_id_pattern() -> String {
    r"FGD\d+".to_owned()
}

fn default_registry_aliases() -> BTreeMap<String, String> {
    BTreeMap::from([("FDG".to_owned(), "FGD".to_owned())])
}

fn default_settle_secs() -> u64 {
    5
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path).map_err(|e| Error::file_io(path, e))?;
        Self::parse(&path.display().to_string(), &yaml)
    }

    /// Parse and validate a configuration. `origin` names the source in errors.
    pub fn parse(origin: &str, yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml).map_err(|e| Error::Config {
            file: origin.to_owned(),
            reason: e.to_string(),
        })?;

        config.validate(origin)
    }

    fn validate(mut self, origin: &str) -> Result<Self> {
        let invalid = |reason: String| Error::Config {
            file: origin.to_owned(),
            reason,
        };

        if let Some(watch) = &mut self.watch {
            if watch.intervals.is_empty() {
                return Err(invalid("watch.intervals must not be empty".to_owned()));
            }
            watch.intervals.sort();
            watch.intervals.dedup();

            watch
                .run_id_regex()
                .map_err(|e| invalid(format!("watch.run_id_pattern: {e}")))?;
        }

        if let Some(guard) = &self.guard {
            guard
                .pipeline()
                .map_err(|e| invalid(format!("guard.command: {e}")))?;
        }

        Ok(self)
    }
}

impl WatchConfig {
    pub fn run_id_regex(&self) -> std::result::Result<Regex, regex::Error> {
        Regex::new(&self.run_id_pattern)
    }

    pub fn registry(&self) -> Box<dyn RunRegistry> {
        match &self.run_registry {
            Some(path) => Box::new(
                self.registry_aliases
                    .iter()
                    .fold(TsvRegistry::new(path), |r, (from, to)| r.with_alias(from, to)),
            ),
            None => Box::new(EmptyRegistry),
        }
    }

    pub fn handoff(&self) -> Box<dyn HandOff> {
        match &self.handoff {
            HandOffConfig::None => Box::new(NoHandOff),
            HandOffConfig::Copy { destination } => Box::new(CopyHandOff::new(destination)),
            HandOffConfig::Scp {
                username,
                host,
                path,
                password_file,
            } => Box::new(ScpHandOff::new(
                username.as_str(),
                host.as_str(),
                path.as_str(),
                password_file,
            )),
        }
    }
}

impl GuardConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_secs(self.settle_secs)
    }

    pub fn poll(&self) -> Duration {
        Duration::from_secs(self.poll_secs.unwrap_or(self.settle_secs))
    }

    pub fn pipeline(&self) -> Result<CommandPipeline> {
        CommandPipeline::new(&self.command)
    }
}
