//! AWS-backed implementations of the pipeline's store traits
//!
//! Each wrapper holds a `tokio` runtime [`Handle`] and bridges the async
//! SDK clients with `Handle::block_on`, so the pipeline stays a
//! single-threaded sequence of blocking calls. The runtime passed to
//! [`AwsClients::connect`] must outlive the wrappers; keep it alive in
//! `main`.
//!
//! [`Handle`]: tokio::runtime::Handle

pub mod dynamo;
pub mod kinesis;
pub mod s3;

pub use dynamo::{DynamoConfigStore, DynamoMetadataStore};
pub use kinesis::KinesisStreamWriter;
pub use s3::S3ObjectStore;

use crate::config::ConfigStore;
use crate::dispatch::StreamWriter;
use crate::remote::ObjectStore;
use crate::tracker::MetadataStore;
use datapump_common::Result;
use std::sync::Arc;
use tracing::info;

/// The four live service clients the pipeline needs.
pub struct AwsClients {
    pub objects: S3ObjectStore,
    pub stream: KinesisStreamWriter,
    pub configs: DynamoConfigStore,
    pub metadata: DynamoMetadataStore,
}

impl AwsClients {
    /// Resolve credentials and region from the environment and build all
    /// clients off one shared config.
    pub fn connect(
        runtime: &tokio::runtime::Runtime,
        config_table: &str,
        metadata_table: &str,
    ) -> Result<Self> {
        let shared =
            runtime.block_on(aws_config::load_defaults(aws_config::BehaviorVersion::latest()));
        let handle = runtime.handle().clone();

        info!(config_table, metadata_table, "AWS clients initialized");

        Ok(Self {
            objects: S3ObjectStore::new(aws_sdk_s3::Client::new(&shared), handle.clone()),
            stream: KinesisStreamWriter::new(aws_sdk_kinesis::Client::new(&shared), handle.clone()),
            configs: DynamoConfigStore::new(
                aws_sdk_dynamodb::Client::new(&shared),
                handle.clone(),
                config_table,
            ),
            metadata: DynamoMetadataStore::new(
                aws_sdk_dynamodb::Client::new(&shared),
                handle,
                metadata_table,
            ),
        })
    }

    #[allow(clippy::type_complexity)]
    pub(crate) fn into_stores(
        self,
    ) -> (
        Arc<dyn ConfigStore>,
        Arc<dyn ObjectStore>,
        Arc<dyn StreamWriter>,
        Arc<dyn MetadataStore>,
    ) {
        (
            Arc::new(self.configs),
            Arc::new(self.objects),
            Arc::new(self.stream),
            Arc::new(self.metadata),
        )
    }
}
