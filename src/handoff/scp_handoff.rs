use std::path::PathBuf;
use std::process::Command;

use crate::errors::*;
use crate::handoff::HandOff;
use crate::run::Interval;
use crate::snapshot::SnapshotPaths;

/// Copies snapshots to a remote host with `sshpass -f <password file> scp`.
pub struct ScpHandOff {
    username: String,
    host: String,
    path: String,
    password_file: PathBuf,
    program: String,
}

impl ScpHandOff {
    const NAME: &'static str = "ScpHandOff";

    pub fn new(
        username: impl Into<String>,
        host: impl Into<String>,
        path: impl Into<String>,
        password_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            username: username.into(),
            host: host.into(),
            path: path.into(),
            password_file: password_file.into(),
            program: "sshpass".to_owned(),
        }
    }

    /// Run `program` in place of `sshpass`, with the same arguments.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self, file: &std::path::Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-f")
            .arg(&self.password_file)
            .arg("scp")
            .arg(file)
            .arg(self.destination());
        cmd
    }
}

impl HandOff for ScpHandOff {
    fn transfer(&self, snapshot: &SnapshotPaths, interval: Interval) -> Result<()> {
        for file in snapshot.files() {
            let status = self.command(file).status().map_err(|e| Error::HandOff {
                context: Self::NAME,
                interval,
                reason: format!("could not run {}: {e}", self.program),
            })?;

            if !status.success() {
                return Err(Error::HandOff {
                    context: Self::NAME,
                    interval,
                    reason: format!("copying {} exited with {status}", file.display()),
                });
            }
        }

        Ok(())
    }

    fn destination(&self) -> String {
        format!("{}@{}:{}", self.username, self.host, self.path)
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}
