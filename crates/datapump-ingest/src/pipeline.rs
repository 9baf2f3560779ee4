//! End-to-end processing of one landed file
//!
//! Trigger input is a single absolute file path plus a service
//! identifier; the pipeline resolves a config entry by directory prefix,
//! reads the file into a table, dispatches it to the streaming log, and
//! records a lifecycle transition at every stage boundary regardless of
//! outcome. Fully sequential: one file, one thread, blocking calls.

use crate::aws::AwsClients;
use crate::config::{config_prefix, ConfigStore};
use crate::dispatch::{BatchDispatcher, StreamWriter};
use crate::reader;
use crate::remote::ObjectStore;
use crate::tracker::{LifecycleTracker, MetadataStore};
use datapump_common::{FileStatus, Result};
use std::sync::Arc;
use tracing::{error, info, info_span};

/// Knobs that are not part of the per-file config entry.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Shard count of the destination stream; bounds partition-key
    /// rotation.
    pub shard_count: u32,
    /// Skip files whose lifecycle record is already
    /// `processed_and_sent_to_kds`. Guards against duplicate submission
    /// under at-least-once triggering.
    pub skip_processed: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            shard_count: 1,
            skip_processed: false,
        }
    }
}

/// How processing of one file ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Completed { rows: usize },
    Failed { status: FileStatus, reason: String },
    Skipped,
}

/// The file pipeline with its injected collaborators.
pub struct Pipeline {
    configs: Arc<dyn ConfigStore>,
    objects: Arc<dyn ObjectStore>,
    stream: Arc<dyn StreamWriter>,
    metadata: Arc<dyn MetadataStore>,
    options: PipelineOptions,
}

impl Pipeline {
    /// Wire the pipeline to live AWS services.
    pub fn new(clients: AwsClients, options: PipelineOptions) -> Self {
        let (configs, objects, stream, metadata) = clients.into_stores();
        Self::with_stores(configs, objects, stream, metadata, options)
    }

    /// Wire the pipeline to arbitrary store implementations.
    pub fn with_stores(
        configs: Arc<dyn ConfigStore>,
        objects: Arc<dyn ObjectStore>,
        stream: Arc<dyn StreamWriter>,
        metadata: Arc<dyn MetadataStore>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            configs,
            objects,
            stream,
            metadata,
            options,
        }
    }

    /// Process one file end to end.
    ///
    /// Ingestion and dispatch faults are recorded as failure outcomes with
    /// the reason persisted on the lifecycle record; config lookup and
    /// metadata store faults propagate as errors and abort the run.
    pub fn run_file(&self, service: &str, file_path: &str) -> Result<FileOutcome> {
        let span = info_span!("run_file", file = %file_path, service);
        let _entered = span.enter();

        let prefix = config_prefix(file_path);
        let config = self.configs.fetch(service, prefix)?;
        info!(
            format = %config.source_data_format,
            stream = %config.dest_stream,
            zipped = config.is_file_zipped,
            "resolved config"
        );

        let tracker = LifecycleTracker::new(self.metadata.as_ref());

        if self.options.skip_processed {
            if let Some(state) = tracker.state(file_path)? {
                if state.status == FileStatus::ProcessedAndSentToKds {
                    info!("file already processed, skipping");
                    return Ok(FileOutcome::Skipped);
                }
            }
        }

        tracker.mark_reading(file_path, config.source_data_format, &config.dest_stream)?;

        let table = match reader::read_file(self.objects.as_ref(), &config, file_path) {
            Ok(table) => {
                tracker.mark(file_path, FileStatus::ReadAndConvertedToDf, "")?;
                table
            },
            Err(err) => {
                let reason = err.to_string();
                error!(%reason, "file read failed");
                tracker.mark(file_path, FileStatus::FailedAtFileRead, &reason)?;
                return Ok(FileOutcome::Failed {
                    status: FileStatus::FailedAtFileRead,
                    reason,
                });
            },
        };

        let dispatcher = BatchDispatcher::new(
            self.stream.as_ref(),
            &config.dest_stream,
            self.options.shard_count,
            config.encoding,
        );
        match dispatcher.dispatch(&table) {
            Ok(rows) => {
                tracker.mark(file_path, FileStatus::ProcessedAndSentToKds, "")?;
                Ok(FileOutcome::Completed { rows })
            },
            Err(err) => {
                let reason = err.to_string();
                error!(%reason, "stream dispatch failed");
                tracker.mark(file_path, FileStatus::FailedAtKinesis, &reason)?;
                Ok(FileOutcome::Failed {
                    status: FileStatus::FailedAtKinesis,
                    reason,
                })
            },
        }
    }
}
