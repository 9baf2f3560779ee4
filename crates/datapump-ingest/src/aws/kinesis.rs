//! Kinesis-backed stream writer

use crate::dispatch::{StreamRecord, StreamWriter};
use aws_sdk_kinesis::primitives::Blob;
use aws_sdk_kinesis::types::PutRecordsRequestEntry;
use aws_sdk_kinesis::Client;
use datapump_common::{PumpError, Result};
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Bulk `PutRecords` writer over blocking calls.
pub struct KinesisStreamWriter {
    client: Client,
    handle: Handle,
}

impl KinesisStreamWriter {
    pub fn new(client: Client, handle: Handle) -> Self {
        Self { client, handle }
    }
}

impl StreamWriter for KinesisStreamWriter {
    fn put_records(&self, stream: &str, records: &[StreamRecord]) -> Result<()> {
        let entries = records
            .iter()
            .map(|record| {
                PutRecordsRequestEntry::builder()
                    .data(Blob::new(record.data.clone()))
                    .partition_key(record.partition_key.clone())
                    .build()
                    .map_err(|e| PumpError::StreamWrite {
                        stream: stream.to_string(),
                        message: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let response = self
            .handle
            .block_on(
                self.client
                    .put_records()
                    .stream_name(stream)
                    .set_records(Some(entries))
                    .send(),
            )
            .map_err(|e| PumpError::StreamWrite {
                stream: stream.to_string(),
                message: e.into_service_error().to_string(),
            })?;

        // Batch-level reporting only; a non-zero failed count is surfaced
        // in the log but does not fail the flush.
        let failed = response.failed_record_count().unwrap_or(0);
        if failed > 0 {
            warn!(failed, stream, "bulk write reported failed records");
        }
        debug!(records = records.len(), stream, "batch delivered");
        Ok(())
    }
}
