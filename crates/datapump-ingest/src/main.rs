//! datapump - process one landed file
//!
//! Reads the file at `--filepath`, resolves its config entry from the
//! DynamoDB config table, and pumps the rows to the configured Kinesis
//! stream, tracking the lifecycle in the metadata table.

use anyhow::Result;
use clap::Parser;
use datapump_common::logging::{init_logging, LogConfig, LogLevel};
use datapump_ingest::aws::AwsClients;
use datapump_ingest::pipeline::{FileOutcome, Pipeline, PipelineOptions};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "datapump")]
#[command(
    author,
    version,
    about = "Reads a landed delimited file and sends its rows to a Kinesis stream"
)]
struct Cli {
    /// Name of the DynamoDB config table
    #[arg(long, env = "DATAPUMP_CONFIG_TABLE", default_value = "clickstream_config")]
    config: String,

    /// Name of the DynamoDB metadata (lifecycle) table
    #[arg(long, env = "DATAPUMP_META_TABLE", default_value = "streaming_metadata")]
    metastore: String,

    /// Service identifier, the partition key of the config table
    #[arg(long, env = "DATAPUMP_SERVICE", default_value = "lambda")]
    service: String,

    /// Absolute file path (s3://bucket/key or a local path)
    #[arg(long)]
    filepath: String,

    /// Shard count of the destination stream, bounds partition-key rotation
    #[arg(long, default_value_t = 1)]
    shard_count: u32,

    /// Skip files already marked processed_and_sent_to_kds
    #[arg(long)]
    skip_processed: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env()?;
    log_config.log_file_prefix = "datapump".to_string();
    if cli.verbose {
        log_config.level = LogLevel::Debug;
    }
    init_logging(&log_config)?;

    // The wrappers only hold a handle; the runtime itself must stay alive
    // for the whole run.
    let runtime = tokio::runtime::Runtime::new()?;
    let clients = AwsClients::connect(&runtime, &cli.config, &cli.metastore)?;
    let pipeline = Pipeline::new(
        clients,
        PipelineOptions {
            shard_count: cli.shard_count,
            skip_processed: cli.skip_processed,
        },
    );

    match pipeline.run_file(&cli.service, &cli.filepath)? {
        FileOutcome::Completed { rows } => {
            info!(rows, file = %cli.filepath, "file processed");
            Ok(())
        },
        FileOutcome::Skipped => {
            info!(file = %cli.filepath, "file already processed, nothing to do");
            Ok(())
        },
        FileOutcome::Failed { status, reason } => {
            anyhow::bail!("processing failed at {status}: {reason}")
        },
    }
}
