//! Bounded batching of rows into the streaming log
//!
//! Rows are serialized in table order, packed into a [`Batch`], and
//! flushed as one bulk write whenever any flush condition holds. The
//! partition key rotates through `1..=shard_count`, advancing once per
//! flush, so the key sequence is a deterministic function of the flush
//! index and re-running a file reproduces it.

use datapump_common::{RecordEncoding, Result, Table};
use tracing::{debug, info};

/// A batch flushes once it holds this many records.
pub const MAX_BATCH_RECORDS: usize = 500;

/// A batch flushes once its payload bytes exceed this. The check runs
/// after the tipping row is appended, so one flush may exceed the
/// threshold by at most that row's serialized size.
pub const FLUSH_BYTE_THRESHOLD: usize = 50_000;

/// One record bound for the streaming log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRecord {
    pub data: Vec<u8>,
    pub partition_key: String,
}

/// Bulk writer into the streaming log. One call per flush; batch-level
/// success or failure only.
pub trait StreamWriter: Send + Sync {
    fn put_records(&self, stream: &str, records: &[StreamRecord]) -> Result<()>;
}

/// Accumulates records and their cumulative payload byte count.
#[derive(Debug, Default)]
pub struct Batch {
    records: Vec<StreamRecord>,
    byte_count: usize,
}

impl Batch {
    pub fn push(&mut self, record: StreamRecord) {
        self.byte_count += record.data.len();
        self.records.push(record);
    }

    /// Flush conditions, evaluated after every append. They are not
    /// mutually exclusive; one flush drains everything accumulated.
    pub fn should_flush(&self, is_last_row: bool) -> bool {
        self.records.len() >= MAX_BATCH_RECORDS
            || self.byte_count > FLUSH_BYTE_THRESHOLD
            || is_last_row
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn byte_count(&self) -> usize {
        self.byte_count
    }

    fn take(&mut self) -> Vec<StreamRecord> {
        self.byte_count = 0;
        std::mem::take(&mut self.records)
    }
}

/// Serialize one row with the configured strategy.
pub fn encode_row(
    encoding: RecordEncoding,
    columns: &[String],
    row: &[String],
) -> Result<Vec<u8>> {
    match encoding {
        RecordEncoding::Delimited => Ok(row.join("|").into_bytes()),
        RecordEncoding::Json => {
            let object: serde_json::Map<String, serde_json::Value> = columns
                .iter()
                .zip(row.iter())
                .map(|(col, value)| (col.clone(), serde_json::Value::String(value.clone())))
                .collect();
            Ok(serde_json::to_vec(&object)?)
        },
    }
}

/// Sends every row of a table to one stream in bounded batches.
pub struct BatchDispatcher<'a> {
    writer: &'a dyn StreamWriter,
    stream: String,
    shard_count: u32,
    encoding: RecordEncoding,
}

impl<'a> BatchDispatcher<'a> {
    pub fn new(
        writer: &'a dyn StreamWriter,
        stream: impl Into<String>,
        shard_count: u32,
        encoding: RecordEncoding,
    ) -> Self {
        Self {
            writer,
            stream: stream.into(),
            shard_count: shard_count.max(1),
            encoding,
        }
    }

    /// Dispatch the whole table, returning the total row count submitted.
    ///
    /// A transport failure aborts the dispatch; batches flushed before the
    /// failure stay delivered and are not rolled back.
    pub fn dispatch(&self, table: &Table) -> Result<usize> {
        let total = table.row_count();
        let mut batch = Batch::default();
        let mut shard = 1u32;
        let mut flushes = 0usize;

        for (index, row) in table.rows().iter().enumerate() {
            let data = encode_row(self.encoding, table.columns(), row)?;
            batch.push(StreamRecord {
                data,
                partition_key: shard.to_string(),
            });

            if batch.should_flush(index + 1 == total) {
                let records = batch.take();
                debug!(
                    records = records.len(),
                    flush = flushes,
                    shard,
                    stream = %self.stream,
                    "flushing batch"
                );
                self.writer.put_records(&self.stream, &records)?;
                flushes += 1;
                shard += 1;
                if shard > self.shard_count {
                    shard = 1;
                }
            }
        }

        info!(total, flushes, stream = %self.stream, "total records sent to stream");
        Ok(total)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use datapump_common::PumpError;
    use std::sync::Mutex;

    /// Records every flushed batch; optionally fails from flush `fail_at`.
    struct RecordingWriter {
        batches: Mutex<Vec<(String, Vec<StreamRecord>)>>,
        fail_at: Option<usize>,
    }

    impl RecordingWriter {
        fn new() -> Self {
            Self {
                batches: Mutex::new(Vec::new()),
                fail_at: None,
            }
        }

        fn failing_at(flush: usize) -> Self {
            Self {
                batches: Mutex::new(Vec::new()),
                fail_at: Some(flush),
            }
        }

        fn batches(&self) -> Vec<(String, Vec<StreamRecord>)> {
            self.batches.lock().unwrap().clone()
        }
    }

    impl StreamWriter for RecordingWriter {
        fn put_records(&self, stream: &str, records: &[StreamRecord]) -> Result<()> {
            let mut batches = self.batches.lock().unwrap();
            if self.fail_at == Some(batches.len()) {
                return Err(PumpError::StreamWrite {
                    stream: stream.to_string(),
                    message: "injected transport failure".to_string(),
                });
            }
            batches.push((stream.to_string(), records.to_vec()));
            Ok(())
        }
    }

    fn table_of(rows: usize, cell: &str) -> Table {
        Table::new(
            vec!["v".to_string()],
            (0..rows).map(|_| vec![cell.to_string()]).collect(),
        )
    }

    #[test]
    fn test_count_bound_rotates_partition_keys() {
        // 100-byte rows never trip the byte threshold before the record
        // count does: 500 * 100 == 50000, which is not strictly over.
        let writer = RecordingWriter::new();
        let dispatcher = BatchDispatcher::new(&writer, "s1", 3, RecordEncoding::Delimited);
        let sent = dispatcher.dispatch(&table_of(1200, &"x".repeat(100))).unwrap();

        assert_eq!(sent, 1200);
        let batches = writer.batches();
        let sizes: Vec<usize> = batches.iter().map(|(_, b)| b.len()).collect();
        assert_eq!(sizes, [500, 500, 200]);
        assert!(batches.iter().all(|(stream, _)| stream == "s1"));
        let keys: Vec<&str> = batches
            .iter()
            .map(|(_, b)| b[0].partition_key.as_str())
            .collect();
        assert_eq!(keys, ["1", "2", "3"]);
        // Every record in a batch carries that batch's key.
        assert!(batches
            .iter()
            .all(|(_, b)| b.iter().all(|r| r.partition_key == b[0].partition_key)));
    }

    #[test]
    fn test_byte_bound_fires_first_and_only_once() {
        // 101-byte rows: 496 * 101 = 50096 tips the byte threshold before
        // the 500-record count is reached.
        let writer = RecordingWriter::new();
        let dispatcher = BatchDispatcher::new(&writer, "s1", 2, RecordEncoding::Delimited);
        dispatcher.dispatch(&table_of(1000, &"y".repeat(101))).unwrap();

        let sizes: Vec<usize> = writer.batches().iter().map(|(_, b)| b.len()).collect();
        assert_eq!(sizes, [496, 496, 8]);

        // The overshoot is at most one row's serialized size.
        let bytes: usize = writer.batches()[0].1.iter().map(|r| r.data.len()).sum();
        assert!(bytes > FLUSH_BYTE_THRESHOLD);
        assert!(bytes <= FLUSH_BYTE_THRESHOLD + 101);

        let keys: Vec<String> = writer
            .batches()
            .iter()
            .map(|(_, b)| b[0].partition_key.clone())
            .collect();
        assert_eq!(keys, ["1", "2", "1"]);
    }

    #[test]
    fn test_shard_wraps_back_to_one() {
        let writer = RecordingWriter::new();
        let dispatcher = BatchDispatcher::new(&writer, "s1", 2, RecordEncoding::Delimited);
        dispatcher.dispatch(&table_of(2000, "z")).unwrap();

        let keys: Vec<String> = writer
            .batches()
            .iter()
            .map(|(_, b)| b[0].partition_key.clone())
            .collect();
        assert_eq!(keys, ["1", "2", "1", "2"]);
    }

    #[test]
    fn test_final_partial_batch_is_flushed() {
        let writer = RecordingWriter::new();
        let dispatcher = BatchDispatcher::new(&writer, "s1", 1, RecordEncoding::Delimited);
        let sent = dispatcher.dispatch(&table_of(3, "a")).unwrap();

        assert_eq!(sent, 3);
        let batches = writer.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].1.len(), 3);
    }

    #[test]
    fn test_empty_table_writes_nothing() {
        let writer = RecordingWriter::new();
        let dispatcher = BatchDispatcher::new(&writer, "s1", 1, RecordEncoding::Delimited);
        assert_eq!(dispatcher.dispatch(&table_of(0, "a")).unwrap(), 0);
        assert!(writer.batches().is_empty());
    }

    #[test]
    fn test_failure_keeps_earlier_flushes() {
        let writer = RecordingWriter::failing_at(1);
        let dispatcher = BatchDispatcher::new(&writer, "s1", 3, RecordEncoding::Delimited);
        let err = dispatcher.dispatch(&table_of(1200, "b")).unwrap_err();

        assert!(err.to_string().contains("injected transport failure"));
        // The first flush was delivered and is not rolled back.
        assert_eq!(writer.batches().len(), 1);
    }

    #[test]
    fn test_delimited_encoding_joins_with_pipe() {
        let data = encode_row(
            RecordEncoding::Delimited,
            &["a".to_string(), "b".to_string()],
            &["1".to_string(), "2".to_string()],
        )
        .unwrap();
        assert_eq!(data, b"1|2");
    }

    #[test]
    fn test_json_encoding_keys_by_column() {
        let data = encode_row(
            RecordEncoding::Json,
            &["a".to_string(), "b".to_string()],
            &["1".to_string(), "2".to_string()],
        )
        .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&data).unwrap();
        assert_eq!(value["a"], "1");
        assert_eq!(value["b"], "2");
    }
}
