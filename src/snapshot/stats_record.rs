use std::fmt::Display;
use std::path::Path;

use crate::errors::*;

pub const RUN_NAME: &str = "Run Name";
pub const DATETIME: &str = "Datetime";
pub const TOTAL_READS: &str = "Total reads";
pub const ANALYSED_READS: &str = "Analysed reads";
pub const MEAN_READ_LENGTH: &str = "Mean read length";
pub const MEAN_QSCORE: &str = "Mean Q-score";
pub const MISSING_READS: &str = "Missing reads";
pub const CHECKSUM: &str = "SHA256";
pub const HOUR: &str = "Hour";

/// An ordered metric to value table, stored as one `metric<TAB>value` line per entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsRecord {
    entries: Vec<(String, String)>,
}

impl StatsRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a metric. A metric that is already present keeps its position.
    pub fn insert(&mut self, metric: impl Into<String>, value: impl Display) {
        let metric = single_line(&metric.into());
        let value = single_line(&value.to_string());

        match self.entries.iter_mut().find(|(m, _)| *m == metric) {
            Some((_, v)) => *v = value,
            None => self.entries.push((metric, value)),
        }
    }

    pub fn get(&self, metric: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(m, _)| m == metric)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(m, v)| (m.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_tsv(&self) -> String {
        self.entries
            .iter()
            .map(|(m, v)| format!("{m}\t{v}\n"))
            .collect()
    }

    /// Parse `metric<TAB>value` lines. Lines without a tab are ignored.
    pub fn parse(content: &str) -> Self {
        let mut record = Self::new();

        for line in content.lines() {
            if let Some((metric, value)) = line.split_once('\t') {
                record.insert(metric, value.trim_end_matches('\r'));
            }
        }

        record
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::file_io(path, e))?;
        Ok(Self::parse(&content))
    }
}

fn single_line(s: &str) -> String {
    s.replace(['\t', '\n', '\r'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_keeps_first_position() {
        let mut record = StatsRecord::new();
        record.insert("Sample ID", "S1");
        record.insert(HOUR, 2);
        record.insert("Sample ID", "S2");

        let entries = record.iter().collect::<Vec<_>>();
        assert_eq!(entries, vec![("Sample ID", "S2"), (HOUR, "2")]);
    }

    #[test]
    fn test_tsv_lines_and_parse() {
        let mut record = StatsRecord::new();
        record.insert(RUN_NAME, "16S_FGD1");
        record.insert(MEAN_QSCORE, format!("{:.2}", 9.0));
        record.insert("Notes", "two\tparts\nand lines");

        let tsv = record.to_tsv();
        assert_eq!(
            tsv,
            "Run Name\t16S_FGD1\nMean Q-score\t9.00\nNotes\ttwo parts and lines\n"
        );
        assert_eq!(StatsRecord::parse(&tsv), record);
    }

    #[test]
    fn test_parse_skips_lines_without_tab() {
        let record = StatsRecord::parse("junk\nHour\t2\r\n\n");
        assert_eq!(record.len(), 1);
        assert_eq!(record.get(HOUR), Some("2"));
    }
}
