use std::path::{Path, PathBuf};

use needletail::{parse_fastx_file, FastxReader};
use rustc_hash::FxHashSet;

use crate::errors::*;
use crate::parse_utils::read_id;

const UNKNOWN_QUAL: u8 = b'I';

/// One sequence record, with the header line kept whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastqRecord {
    pub header: Vec<u8>,
    pub seq: Vec<u8>,
    pub qual: Vec<u8>,
}

impl FastqRecord {
    pub fn id(&self) -> &[u8] {
        read_id(&self.header)
    }

    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Wanted records, in the order they were found.
    pub records: Vec<FastqRecord>,
    /// Wanted identifiers not present in any container, in the order they were wanted.
    pub missing: Vec<String>,
    /// Mean sequence length of `records`, or `0.0` if there are none.
    pub mean_length: f64,
    pub containers_scanned: usize,
    /// Containers abandoned at an unreadable record. Records before it are kept.
    pub corrupt_containers: Vec<CorruptContainer>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorruptContainer {
    pub path: PathBuf,
    /// Index of the first record that could not be read.
    pub idx: usize,
    pub reason: String,
}

/// Scan sequence containers for the records whose identifier is in `wanted`.
///
/// Every container is scanned until all wanted records have been found. An identifier
/// that appears in several containers is collected once, from the first container.
/// Zero-byte containers are skipped since the instrument creates them before writing.
/// A container that cannot be parsed is recorded in `corrupt_containers` and the scan
/// moves on to the next one.
pub fn extract_reads<P: AsRef<Path>>(
    containers: impl IntoIterator<Item = P>,
    wanted: &[String],
) -> Result<Extraction> {
    let wanted_set = wanted.iter().map(|id| id.as_bytes()).collect::<FxHashSet<_>>();
    let mut found = FxHashSet::<Vec<u8>>::default();
    let mut extraction = Extraction::default();

    if wanted_set.is_empty() {
        return Ok(extraction);
    }

    'containers: for container in containers {
        let path = container.as_ref();
        let len = std::fs::metadata(path)
            .map_err(|e| Error::file_io(path, e))?
            .len();
        if len == 0 {
            continue;
        }

        extraction.containers_scanned += 1;
        let mut reader = match parse_fastx_file(path) {
            Ok(reader) => reader,
            Err(e) => {
                extraction.corrupt_containers.push(CorruptContainer {
                    path: path.to_owned(),
                    idx: 0,
                    reason: e.to_string(),
                });
                continue;
            }
        };
        let mut idx = 0;

        while let Some(record) = reader.next() {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    extraction.corrupt_containers.push(CorruptContainer {
                        path: path.to_owned(),
                        idx,
                        reason: e.to_string(),
                    });
                    continue 'containers;
                }
            };
            idx += 1;

            let id = read_id(record.id());
            if !wanted_set.contains(id) || found.contains(id) {
                continue;
            }
            found.insert(id.to_owned());

            let seq = record.seq().into_owned();
            let qual = record
                .qual()
                .map(|q| q.to_owned())
                .unwrap_or_else(|| vec![UNKNOWN_QUAL; seq.len()]);
            extraction.records.push(FastqRecord {
                header: record.id().to_owned(),
                seq,
                qual,
            });

            if found.len() == wanted_set.len() {
                break 'containers;
            }
        }
    }

    extraction.missing = wanted
        .iter()
        .filter(|id| !found.contains(id.as_bytes()))
        .cloned()
        .collect();

    if !extraction.records.is_empty() {
        let total = extraction.records.iter().map(|r| r.len()).sum::<usize>();
        extraction.mean_length = total as f64 / extraction.records.len() as f64;
    }

    Ok(extraction)
}
