use std::path::Path;
use std::process::Command;

use crate::errors::*;
use crate::guard::Pipeline;
use crate::parse_utils::*;
use crate::snapshot::SnapshotPaths;

const PLACEHOLDERS: [&str; 5] = ["prefix", "fastq", "summary", "stats", "dir"];

/// Runs an external program once per snapshot.
///
/// Every argument is a template whose `{prefix}`, `{fastq}`, `{summary}`, `{stats}` and
/// `{dir}` placeholders are filled in from the snapshot. The program runs inside the
/// snapshot's directory and must exit successfully.
#[derive(Debug, Clone)]
pub struct CommandPipeline {
    program: Vec<TemplatePart>,
    args: Vec<Vec<TemplatePart>>,
}

impl CommandPipeline {
    const NAME: &'static str = "CommandPipeline";

    pub fn new<S: AsRef<str>>(command: &[S]) -> Result<Self> {
        let mut templates = command
            .iter()
            .map(|t| Self::parse_arg(t.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        if templates.is_empty() {
            return Err(Error::Parse {
                string: String::new(),
                context: "command".to_owned(),
                reason: "command must name a program",
            });
        }
        let program = templates.remove(0);

        Ok(Self {
            program,
            args: templates,
        })
    }

    fn parse_arg(template: &str) -> Result<Vec<TemplatePart>> {
        let parts = parse_template(template.as_bytes())?;

        for part in &parts {
            if let TemplatePart::Placeholder(name) = part {
                if !PLACEHOLDERS.contains(&name.as_str()) {
                    return Err(Error::Parse {
                        string: template.to_owned(),
                        context: "command template".to_owned(),
                        reason: "unknown placeholder",
                    });
                }
            }
        }

        Ok(parts)
    }

    /// The program and arguments for `snapshot`.
    pub fn render(&self, snapshot: &SnapshotPaths) -> (String, Vec<String>) {
        let fill = |parts: &[TemplatePart]| {
            parts
                .iter()
                .map(|part| match part {
                    TemplatePart::Literal(s) => s.clone(),
                    TemplatePart::Placeholder(name) => match name.as_str() {
                        "prefix" => snapshot.prefix.clone(),
                        "fastq" => display(&snapshot.fastq),
                        "summary" => display(&snapshot.summary),
                        "stats" => display(&snapshot.stats),
                        _ => display(&snapshot.dir),
                    },
                })
                .collect::<String>()
        };

        (fill(&self.program), self.args.iter().map(|a| fill(a)).collect())
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

impl Pipeline for CommandPipeline {
    fn run(&self, snapshot: &SnapshotPaths) -> Result<()> {
        let (program, args) = self.render(snapshot);
        let fail = |reason: String| Error::Pipeline {
            context: Self::NAME,
            prefix: snapshot.prefix.clone(),
            reason,
        };

        let output = Command::new(&program)
            .args(&args)
            .current_dir(&snapshot.dir)
            .output()
            .map_err(|e| fail(format!("could not run {program}: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let last = stderr.lines().last().unwrap_or("").trim();
            return Err(fail(format!("{program} exited with {}: {last}", output.status)));
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}
