//! Tabular ingestion sources.
//!
//! Reads (id, text) pairs from tab-separated files with a header row.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use vsearch_core::{AppError, AppResult};

/// One (id, text) pair to ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    pub id: String,
    pub text: String,
}

impl SourceRecord {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// An item produced by a source.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceRow {
    /// A usable record
    Record(SourceRecord),
    /// A row that could not be turned into a record; ingestion continues
    Malformed {
        line: u64,
        id: Option<String>,
        reason: String,
    },
}

impl From<SourceRecord> for SourceRow {
    fn from(record: SourceRecord) -> Self {
        SourceRow::Record(record)
    }
}

/// Iterator over the rows of a TSV source.
///
/// Yields `Err` only when the source itself can no longer be read; that ends
/// ingestion. Rows with missing values are yielded as `SourceRow::Malformed`.
pub struct TsvSource<R: Read> {
    records: csv::StringRecordsIntoIter<R>,
    id_idx: usize,
    text_idx: usize,
    failed: bool,
}

impl TsvSource<File> {
    /// Open a TSV file whose header names `id_column` and `text_column`.
    pub fn open(path: &Path, id_column: &str, text_column: &str) -> AppResult<Self> {
        let file = File::open(path).map_err(|e| {
            AppError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to open source {:?}: {}", path, e),
            ))
        })?;
        Self::from_reader(file, id_column, text_column)
    }
}

impl<R: Read> TsvSource<R> {
    pub fn from_reader(reader: R, id_column: &str, text_column: &str) -> AppResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = reader
            .headers()
            .map_err(|e| source_error("Failed to read source header", e))?
            .clone();

        let position = |name: &str| -> AppResult<usize> {
            headers.iter().position(|h| h.trim() == name).ok_or_else(|| {
                AppError::InvalidRequest(format!(
                    "Source has no '{}' column (columns: {})",
                    name,
                    headers.iter().collect::<Vec<_>>().join(", ")
                ))
            })
        };

        let id_idx = position(id_column)?;
        let text_idx = position(text_column)?;

        Ok(Self {
            records: reader.into_records(),
            id_idx,
            text_idx,
            failed: false,
        })
    }
}

impl<R: Read> Iterator for TsvSource<R> {
    type Item = AppResult<SourceRow>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let record = match self.records.next()? {
            Ok(record) => record,
            Err(e) if e.is_io_error() => {
                self.failed = true;
                return Some(Err(source_error("Failed to read source", e)));
            }
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                return Some(Ok(SourceRow::Malformed {
                    line,
                    id: None,
                    reason: e.to_string(),
                }));
            }
        };

        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let id = record.get(self.id_idx).map(str::trim).filter(|s| !s.is_empty());
        let text = record.get(self.text_idx);

        let row = match (id, text) {
            (Some(id), Some(text)) => SourceRow::Record(SourceRecord::new(id, text)),
            (None, _) => SourceRow::Malformed {
                line,
                id: None,
                reason: "missing id value".to_string(),
            },
            (Some(id), None) => SourceRow::Malformed {
                line,
                id: Some(id.to_string()),
                reason: "missing text value".to_string(),
            },
        };

        Some(Ok(row))
    }
}

fn source_error(context: &str, err: csv::Error) -> AppError {
    match err.into_kind() {
        csv::ErrorKind::Io(e) => {
            AppError::Io(std::io::Error::new(e.kind(), format!("{}: {}", context, e)))
        }
        other => AppError::Index(format!("{}: {:?}", context, other)),
    }
}
