//! Per-file lifecycle tracking
//!
//! Records a finite sequence of processing states in a durable key-value
//! store so partial failures stay observable and attributable. Store
//! failures are never swallowed here: the tracker is the
//! attribution-of-truth mechanism, and a silent tracker failure would be
//! worse than a hard stop.

use chrono::{DateTime, Utc};
use datapump_common::{FileState, FileStatus, Result, SourceFormat};
use tracing::debug;

/// Key-value item store keyed by file name.
pub trait MetadataStore: Send + Sync {
    fn get(&self, file_name: &str) -> Result<Option<FileState>>;

    fn put(&self, state: &FileState) -> Result<()>;

    /// Overwrite status, reason, and updated timestamp of an existing
    /// record. The record's creation timestamp is left untouched.
    fn update(
        &self,
        file_name: &str,
        status: FileStatus,
        reason: &str,
        updated: DateTime<Utc>,
    ) -> Result<()>;
}

/// State machine over a [`MetadataStore`]:
/// `reading_file -> read_and_converted_to_df -> processed_and_sent_to_kds`,
/// with `failed_at_file_read` / `failed_at_kinesis` reachable from the
/// first two. Terminal states are never left automatically and records are
/// never deleted.
pub struct LifecycleTracker<'a> {
    store: &'a dyn MetadataStore,
}

impl<'a> LifecycleTracker<'a> {
    pub fn new(store: &'a dyn MetadataStore) -> Self {
        Self { store }
    }

    pub fn state(&self, file_name: &str) -> Result<Option<FileState>> {
        self.store.get(file_name)
    }

    /// Enter `reading_file`, creating the record on first sight.
    ///
    /// On re-processing the status and updated timestamp move and the
    /// reason is cleared, but the original creation timestamp is kept.
    pub fn mark_reading(
        &self,
        file_name: &str,
        file_format: SourceFormat,
        dest_stream: &str,
    ) -> Result<()> {
        let now = Utc::now();
        if self.store.get(file_name)?.is_some() {
            debug!(file_name, "re-entering reading_file for existing record");
            self.store
                .update(file_name, FileStatus::ReadingFile, "", now)
        } else {
            self.store.put(&FileState {
                file_name: file_name.to_string(),
                status: FileStatus::ReadingFile,
                file_format,
                dest_stream: dest_stream.to_string(),
                reason: String::new(),
                create_timestamp: now,
                updated_timestamp: now,
            })
        }
    }

    /// Record any later stage. The record is assumed to exist already.
    pub fn mark(&self, file_name: &str, status: FileStatus, reason: &str) -> Result<()> {
        debug_assert!(status != FileStatus::ReadingFile);
        debug!(file_name, status = %status, "lifecycle transition");
        self.store.update(file_name, status, reason, Utc::now())
    }
}
