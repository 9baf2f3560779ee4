//! Error types for datapump

use thiserror::Error;

/// Result type alias for datapump operations
pub type Result<T> = std::result::Result<T, PumpError>;

/// Main error type for datapump
///
/// Ingestion-stage variants (`UnsupportedFormat`, `SchemaMismatch`,
/// `RemoteRead`, `Parse`) are recorded on the file's lifecycle record as a
/// failure reason; `TrackerWrite` is never swallowed and aborts the run.
#[derive(Error, Debug)]
pub enum PumpError {
    #[error("no config entry for service '{service}' and path prefix '{path_prefix}'")]
    ConfigNotFound { service: String, path_prefix: String },

    #[error("unsupported source format: {0}")]
    UnsupportedFormat(String),

    #[error("number of columns [{columns}] in the config table is {configured}, but the dataset had {found} columns")]
    SchemaMismatch {
        configured: usize,
        found: usize,
        columns: String,
    },

    #[error("object not found: s3://{bucket}/{key}")]
    ObjectNotFound { bucket: String, key: String },

    #[error("remote read failed: {0}")]
    RemoteRead(String),

    #[error("stream write to '{stream}' failed: {message}")]
    StreamWrite { stream: String, message: String },

    #[error("metadata store write failed: {0}")]
    TrackerWrite(String),

    #[error("table read failed: {0}")]
    Database(String),

    #[error("unable to parse file: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
