//! Datapump Ingest Library
//!
//! Reads delimited files that land in an object store (or on a local
//! path), converts them into an in-memory row table, and forwards the
//! rows to a shard-partitioned streaming log in bounded batches, while
//! recording each file's processing lifecycle in a metadata store.
//!
//! External services are reached through the traits in [`remote`],
//! [`dispatch`], [`tracker`], and [`config`]; the `aws` module provides
//! the S3 / Kinesis / DynamoDB implementations and tests substitute
//! in-memory fakes.
//!
//! # Example
//!
//! ```no_run
//! use datapump_ingest::aws::AwsClients;
//! use datapump_ingest::pipeline::{Pipeline, PipelineOptions};
//!
//! fn main() -> anyhow::Result<()> {
//!     let runtime = tokio::runtime::Runtime::new()?;
//!     let clients = AwsClients::connect(&runtime, "config_table", "meta_table")?;
//!     let pipeline = Pipeline::new(clients, PipelineOptions::default());
//!     let outcome = pipeline.run_file("lambda", "s3://bucket/landing/data.tsv")?;
//!     println!("{outcome:?}");
//!     Ok(())
//! }
//! ```

pub mod aws;
pub mod config;
pub mod dispatch;
pub mod pipeline;
pub mod reader;
pub mod remote;
pub mod tracker;
