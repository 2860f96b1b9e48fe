use std::fs;
use std::path::PathBuf;

use crate::errors::*;
use crate::handoff::HandOff;
use crate::run::Interval;
use crate::snapshot::{partial_path, SnapshotPaths};

/// Copies snapshots into a local or mounted directory.
pub struct CopyHandOff {
    destination: PathBuf,
}

impl CopyHandOff {
    const NAME: &'static str = "CopyHandOff";

    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
        }
    }
}

impl HandOff for CopyHandOff {
    fn transfer(&self, snapshot: &SnapshotPaths, interval: Interval) -> Result<()> {
        let fail = |reason: String| Error::HandOff {
            context: Self::NAME,
            interval,
            reason,
        };

        fs::create_dir_all(&self.destination)
            .map_err(|e| fail(format!("{}: {e}", self.destination.display())))?;

        for file in snapshot.files() {
            let Some(name) = file.file_name() else {
                return Err(fail(format!("{} has no file name", file.display())));
            };
            let target = self.destination.join(name);
            let partial = partial_path(&target);

            // the consumer only ever sees complete files under their final name
            fs::copy(file, &partial)
                .and_then(|_| fs::rename(&partial, &target))
                .map_err(|e| {
                    let _ = fs::remove_file(&partial);
                    fail(format!("{} -> {}: {e}", file.display(), target.display()))
                })?;
        }

        Ok(())
    }

    fn destination(&self) -> String {
        self.destination.display().to_string()
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}
