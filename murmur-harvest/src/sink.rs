use crate::record::Record;
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

const CSV_HEADER: [&str; 3] = ["text", "author", "date"];

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("json encode failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("date format failed: {0}")]
    Date(#[from] time::error::Format),

    #[error("{path} row {row}: bad date `{value}`: {source}")]
    ExistingRow {
        path: PathBuf,
        row: u64,
        value: String,
        #[source]
        source: time::error::Parse,
    },
}

impl SinkError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(Serialize)]
struct CsvRow<'a> {
    text: &'a str,
    author: &'a str,
    date: String,
}

#[derive(Deserialize)]
struct StoredRow {
    text: String,
    author: String,
    date: String,
}

/// Output files for one harvest.
///
/// The CSV is an append-only log: rows from earlier runs stay, and the header
/// is only written into an empty file. Rows already in the CSV are read back on
/// open so the JSON snapshot, replaced whole on every write, always mirrors the
/// complete CSV.
pub struct RecordSink {
    csv_path: PathBuf,
    json_path: PathBuf,
    csv: csv::Writer<File>,
    existing: Vec<Record>,
}

impl RecordSink {
    pub fn open(csv_path: impl Into<PathBuf>, json_path: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let csv_path = csv_path.into();
        let json_path = json_path.into();
        ensure_parent(&csv_path)?;
        ensure_parent(&json_path)?;

        let existing = match fs::metadata(&csv_path) {
            Ok(meta) if meta.len() > 0 => read_existing(&csv_path)?,
            _ => Vec::new(),
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&csv_path)
            .map_err(|e| SinkError::io(&csv_path, e))?;
        let fresh = file.metadata().map_err(|e| SinkError::io(&csv_path, e))?.len() == 0;

        let mut csv = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        if fresh {
            csv.write_record(CSV_HEADER)?;
            csv.flush().map_err(|e| SinkError::io(&csv_path, e))?;
        }
        tracing::debug!(
            csv = %csv_path.display(),
            json = %json_path.display(),
            existing = existing.len(),
            "record sink open"
        );

        Ok(Self {
            csv_path,
            json_path,
            csv,
            existing,
        })
    }

    /// Records found in the CSV when it was opened. Empties the buffer.
    pub fn take_existing(&mut self) -> Vec<Record> {
        std::mem::take(&mut self.existing)
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }

    pub fn json_path(&self) -> &Path {
        &self.json_path
    }

    /// Append one row and flush it, so a crash never loses an accepted record.
    pub fn append(&mut self, record: &Record) -> Result<(), SinkError> {
        let row = CsvRow {
            text: &record.text,
            author: &record.author,
            date: record.created_at.format(&Rfc3339)?,
        };
        self.csv.serialize(row)?;
        self.csv.flush().map_err(|e| SinkError::io(&self.csv_path, e))
    }

    /// Replace the JSON file with `records`, 4-space indented.
    pub fn write_snapshot(&self, records: &[Record]) -> Result<(), SinkError> {
        let mut buf = Vec::with_capacity(records.len() * 256 + 2);
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
        records.serialize(&mut ser)?;
        buf.push(b'\n');

        let tmp = self.json_path.with_extension("json.tmp");
        fs::write(&tmp, &buf).map_err(|e| SinkError::io(&tmp, e))?;
        fs::rename(&tmp, &self.json_path).map_err(|e| SinkError::io(&self.json_path, e))?;
        tracing::trace!(path = %self.json_path.display(), records = records.len(), "json snapshot written");
        Ok(())
    }
}

fn read_existing(path: &Path) -> Result<Vec<Record>, SinkError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for (idx, row) in reader.deserialize::<StoredRow>().enumerate() {
        let row = row?;
        let created_at = OffsetDateTime::parse(&row.date, &Rfc3339).map_err(|source| SinkError::ExistingRow {
            path: path.to_path_buf(),
            row: idx as u64 + 1,
            value: row.date.clone(),
            source,
        })?;
        records.push(Record {
            text: row.text,
            author: row.author,
            created_at,
        });
    }
    Ok(records)
}

fn ensure_parent(path: &Path) -> Result<(), SinkError> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            fs::create_dir_all(dir).map_err(|e| SinkError::io(dir, e))
        }
        _ => Ok(()),
    }
}
