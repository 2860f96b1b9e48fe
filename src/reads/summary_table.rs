use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};

use crate::errors::*;

pub const READ_ID: &str = "read_id";
pub const PASSES_FILTERING: &str = "passes_filtering";
pub const START_TIME: &str = "start_time";
pub const MEAN_QSCORE: &str = "mean_qscore_template";

const PASSED: &str = "TRUE";

/// The reads a summary table records as started by some elapsed time.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReadWindow {
    /// Identifiers of passing reads inside the window, in table order.
    pub passed: Vec<String>,
    /// Every read inside the window, passing or not.
    pub total_reads: usize,
    /// Mean quality over the passing reads, or `0.0` if there are none.
    pub mean_qscore: f64,
    /// Rows skipped because they were short or had unparseable numbers.
    pub malformed_rows: usize,
}

struct Columns {
    read_id: usize,
    passes_filtering: usize,
    start_time: usize,
    mean_qscore: usize,
}

impl Columns {
    fn from_header(header: &StringRecord, origin: &str) -> Result<Self> {
        let position = |column: &'static str| {
            header
                .iter()
                .position(|h| h == column)
                .ok_or_else(|| Error::MissingColumn {
                    file: origin.to_owned(),
                    column,
                })
        };

        Ok(Self {
            read_id: position(READ_ID)?,
            passes_filtering: position(PASSES_FILTERING)?,
            start_time: position(START_TIME)?,
            mean_qscore: position(MEAN_QSCORE)?,
        })
    }
}

/// How the fields of a summary table are separated, decided by its header line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    /// Single tabs; empty fields are kept and padding spaces are trimmed.
    Tabs,
    /// Runs of ASCII whitespace, tabs included.
    Whitespace,
}

impl Layout {
    fn of(header_line: &str) -> Self {
        if header_line.contains('\t') {
            Layout::Tabs
        } else {
            Layout::Whitespace
        }
    }
}

/// A per-read sequencing summary table, kept verbatim alongside its parsed header.
///
/// A header containing a tab makes the table tab separated. Otherwise every line is
/// split on runs of whitespace.
pub struct SummaryTable {
    origin: String,
    content: String,
    layout: Layout,
    columns: Columns,
}

impl SummaryTable {
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::file_io(path, e))?;
        Self::from_content(path.display().to_string(), content)
    }

    /// Parse the header of `content`. Fails if a required column is absent.
    pub fn from_content(origin: impl Into<String>, content: String) -> Result<Self> {
        let origin = origin.into();
        let header_line = content.lines().next().unwrap_or_default();
        let layout = Layout::of(header_line);

        let header = match layout {
            Layout::Tabs => reader(&content)
                .headers()
                .map_err(|e| Error::ParseRecord {
                    origin: origin.clone(),
                    idx: 0,
                    source: Box::new(e),
                })?
                .clone(),
            Layout::Whitespace => split_whitespace(header_line),
        };
        let columns = Columns::from_header(&header, &origin)?;

        Ok(Self {
            origin,
            content,
            layout,
            columns,
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// The raw table text, exactly as read.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Classify every row against an elapsed-time threshold in seconds.
    ///
    /// A row is inside the window when its start time is at most `threshold_secs`.
    pub fn select(&self, threshold_secs: f64) -> ReadWindow {
        let mut window = ReadWindow::default();
        let mut qscore_sum = 0.0;

        for row in self.rows() {
            let Some((read_id, passed, start_time, qscore)) =
                row.as_ref().and_then(|r| self.parse_row(r))
            else {
                window.malformed_rows += 1;
                continue;
            };

            if start_time <= threshold_secs {
                window.total_reads += 1;

                if passed {
                    window.passed.push(read_id);
                    qscore_sum += qscore;
                }
            }
        }

        if !window.passed.is_empty() {
            window.mean_qscore = qscore_sum / window.passed.len() as f64;
        }

        window
    }

    /// Data rows after the header, blank lines skipped. `None` is a row that could not be read.
    fn rows(&self) -> Box<dyn Iterator<Item = Option<StringRecord>> + '_> {
        match self.layout {
            Layout::Tabs => Box::new(reader(&self.content).into_records().map(|r| r.ok())),
            Layout::Whitespace => Box::new(
                self.content
                    .lines()
                    .skip(1)
                    .filter(|line| !line.trim().is_empty())
                    .map(|line| Some(split_whitespace(line))),
            ),
        }
    }

    fn parse_row(&self, row: &StringRecord) -> Option<(String, bool, f64, f64)> {
        let read_id = row.get(self.columns.read_id)?;
        let passed = row.get(self.columns.passes_filtering)? == PASSED;
        let start_time = row.get(self.columns.start_time)?.parse().ok()?;
        let qscore = row.get(self.columns.mean_qscore)?.parse().ok()?;

        Some((read_id.to_owned(), passed, start_time, qscore))
    }
}

fn reader(content: &str) -> csv::Reader<&[u8]> {
    ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .quoting(false)
        .trim(Trim::All)
        .from_reader(content.as_bytes())
}

fn split_whitespace(line: &str) -> StringRecord {
    StringRecord::from(line.split_ascii_whitespace().collect::<Vec<_>>())
}
