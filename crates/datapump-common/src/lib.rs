//! Datapump Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, logging, and error handling for the datapump workspace.
//!
//! # Overview
//!
//! - **Error Handling**: the [`PumpError`] taxonomy and [`Result`] alias
//! - **Logging**: `tracing`-based logging configuration
//! - **Types**: per-file config, lifecycle states, and the in-memory table

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{PumpError, Result};
pub use types::{ConfigRecord, FileState, FileStatus, RecordEncoding, SourceFormat, Table};
