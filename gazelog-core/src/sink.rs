//! Record sinks
//!
//! A [`RecordSink`] appends finished card records somewhere durable. The CSV
//! sink writes the fixed header once, when the file is new or empty.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

use crate::error::SinkError;
use crate::record::{CSV_HEADER, CardRecord};

/// Column names written by earlier versions of the experiment logger
const LEGACY_COLUMNS: [&str; 3] = ["answer", "side_choice", "reveal_to_drop_duration_s"];

/// Destination for completed card records
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Append one record
    async fn append(&self, record: &CardRecord) -> Result<(), SinkError>;
}

/// Outcome of inspecting an existing CSV file's header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderCheck {
    /// The file was new or empty and the header was written
    Created,
    /// The existing header matches
    Matches,
    /// The existing header has no `move_duration` column
    MissingDuration(Vec<String>),
    /// The existing header uses pre-rename column names
    LegacyColumns(Vec<String>),
    /// Some other header
    Mismatch(Vec<String>),
    /// The existing first line could not be read; appends still go ahead
    Unreadable(String),
}

impl HeaderCheck {
    fn classify(existing: Vec<String>) -> Self {
        if existing.iter().eq(CSV_HEADER.iter()) {
            HeaderCheck::Matches
        } else if !existing.iter().any(|c| c == "move_duration") {
            HeaderCheck::MissingDuration(existing)
        } else if existing
            .iter()
            .any(|c| LEGACY_COLUMNS.contains(&c.as_str()))
        {
            HeaderCheck::LegacyColumns(existing)
        } else {
            HeaderCheck::Mismatch(existing)
        }
    }
}

/// Append-only CSV file sink
pub struct CsvSink {
    path: PathBuf,
    /// Serializes appends so the header check and row write are not interleaved
    write_lock: Mutex<()>,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Prepare the file at startup
    ///
    /// Writes the header to a new or empty file, otherwise reports how the
    /// existing header compares to [`CSV_HEADER`]. Existing files are never
    /// rewritten. Failing to read an existing header is reported as
    /// [`HeaderCheck::Unreadable`], not as an error.
    pub async fn initialize(&self) -> Result<HeaderCheck, SinkError> {
        let _guard = self.write_lock.lock().await;
        self.ensure_parent_dir().await?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        if file.metadata().await?.len() == 0 {
            file.write_all(&encode_header()?).await?;
            file.flush().await?;
            return Ok(HeaderCheck::Created);
        }
        drop(file);

        match self.read_header().await {
            Ok(existing) => Ok(HeaderCheck::classify(existing)),
            Err(e) => Ok(HeaderCheck::Unreadable(e.to_string())),
        }
    }

    async fn read_header(&self) -> Result<Vec<String>, SinkError> {
        let file = File::open(&self.path).await?;
        let mut first_line = String::new();
        BufReader::new(file).read_line(&mut first_line).await?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(first_line.as_bytes());
        let header = match reader.records().next() {
            Some(row) => row?.iter().map(str::to_string).collect(),
            None => Vec::new(),
        };
        Ok(header)
    }

    async fn ensure_parent_dir(&self) -> Result<(), SinkError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl RecordSink for CsvSink {
    async fn append(&self, record: &CardRecord) -> Result<(), SinkError> {
        let row = encode_row(record)?;

        let _guard = self.write_lock.lock().await;
        self.ensure_parent_dir().await?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        if file.metadata().await?.len() == 0 {
            file.write_all(&encode_header()?).await?;
        }
        file.write_all(&row).await?;
        file.flush().await?;

        Ok(())
    }
}

fn encode_header() -> Result<Vec<u8>, SinkError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;
    writer
        .into_inner()
        .map_err(|e| SinkError::Buffer(e.to_string()))
}

fn encode_row(record: &CardRecord) -> Result<Vec<u8>, SinkError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.serialize(record)?;
    writer
        .into_inner()
        .map_err(|e| SinkError::Buffer(e.to_string()))
}

/// In-memory sink, mainly for tests
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<CardRecord>>,
    fail_writes: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every append fails with an I/O error
    pub fn failing() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            fail_writes: true,
        }
    }

    /// Records appended so far
    pub async fn records(&self) -> Vec<CardRecord> {
        self.records.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn append(&self, record: &CardRecord) -> Result<(), SinkError> {
        if self.fail_writes {
            return Err(SinkError::Io(std::io::Error::other("memory sink set to fail")));
        }
        self.records.lock().await.push(record.clone());
        Ok(())
    }
}
