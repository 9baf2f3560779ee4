//! Common types used across datapump

use crate::error::PumpError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Field delimiter of a source file, as stored in the config table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Comma,
    Tab,
    /// One-or-more-whitespace separated; split on runs, not a single byte.
    Space,
    Pipe,
}

impl SourceFormat {
    /// Single-byte delimiter, or `None` for whitespace-run splitting.
    pub fn delimiter(self) -> Option<u8> {
        match self {
            SourceFormat::Comma => Some(b','),
            SourceFormat::Tab => Some(b'\t'),
            SourceFormat::Space => None,
            SourceFormat::Pipe => Some(b'|'),
        }
    }
}

impl std::str::FromStr for SourceFormat {
    type Err = PumpError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "comma" => Ok(SourceFormat::Comma),
            "tab" => Ok(SourceFormat::Tab),
            "space" => Ok(SourceFormat::Space),
            "pipe" => Ok(SourceFormat::Pipe),
            other => Err(PumpError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceFormat::Comma => write!(f, "comma"),
            SourceFormat::Tab => write!(f, "tab"),
            SourceFormat::Space => write!(f, "space"),
            SourceFormat::Pipe => write!(f, "pipe"),
        }
    }
}

/// How a row is serialized into a stream record payload.
///
/// The default joins the field values with `|`; the JSON strategy emits an
/// object keyed by column name. Selected per config entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordEncoding {
    #[default]
    Delimited,
    Json,
}

impl std::str::FromStr for RecordEncoding {
    type Err = PumpError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "delimited" | "pipe" => Ok(RecordEncoding::Delimited),
            "json" => Ok(RecordEncoding::Json),
            other => Err(PumpError::UnsupportedFormat(format!(
                "unknown record encoding '{other}'"
            ))),
        }
    }
}

/// Per-(service, path prefix) ingestion settings fetched from the config
/// table. Immutable for the duration of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigRecord {
    pub source_data_format: SourceFormat,
    pub header_exist: bool,
    /// Comma-separated column names; required when `header_exist` is false.
    pub column_names: String,
    pub is_file_zipped: bool,
    /// Destination stream name in the streaming log.
    pub dest_stream: String,
    #[serde(default)]
    pub encoding: RecordEncoding,
}

impl ConfigRecord {
    /// Configured column names, comma-split and trimmed.
    pub fn configured_columns(&self) -> Vec<String> {
        self.column_names
            .split(',')
            .map(|c| c.trim().to_string())
            .collect()
    }
}

/// Lifecycle stage of a file, recorded in the metadata store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    ReadingFile,
    ReadAndConvertedToDf,
    ProcessedAndSentToKds,
    FailedAtFileRead,
    FailedAtKinesis,
}

impl FileStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FileStatus::ReadingFile => "reading_file",
            FileStatus::ReadAndConvertedToDf => "read_and_converted_to_df",
            FileStatus::ProcessedAndSentToKds => "processed_and_sent_to_kds",
            FileStatus::FailedAtFileRead => "failed_at_file_read",
            FileStatus::FailedAtKinesis => "failed_at_kinesis",
        }
    }

    /// Terminal states are never transitioned out of automatically.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            FileStatus::ProcessedAndSentToKds
                | FileStatus::FailedAtFileRead
                | FileStatus::FailedAtKinesis
        )
    }
}

impl std::str::FromStr for FileStatus {
    type Err = PumpError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "reading_file" => Ok(FileStatus::ReadingFile),
            "read_and_converted_to_df" => Ok(FileStatus::ReadAndConvertedToDf),
            "processed_and_sent_to_kds" => Ok(FileStatus::ProcessedAndSentToKds),
            "failed_at_file_read" => Ok(FileStatus::FailedAtFileRead),
            "failed_at_kinesis" => Ok(FileStatus::FailedAtKinesis),
            other => Err(PumpError::Parse(format!("unknown file status '{other}'"))),
        }
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable processing record for one file, keyed by its path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileState {
    pub file_name: String,
    pub status: FileStatus,
    pub file_format: SourceFormat,
    pub dest_stream: String,
    /// Empty on success paths, a descriptive message on failure paths.
    pub reason: String,
    pub create_timestamp: DateTime<Utc>,
    pub updated_timestamp: DateTime<Utc>,
}

/// Row-oriented in-memory table: ordered rows positionally aligned to an
/// ordered column-name sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
