//! datapump-poller - queue-driven trigger loop
//!
//! Long-polls an SQS queue whose messages carry landed file paths, runs
//! the pipeline for each path, and deletes the message once the file's
//! lifecycle record has been written. A failed file does not stop the
//! loop; only config or tracker faults abort.

use anyhow::{Context, Result};
use clap::Parser;
use datapump_common::logging::{init_logging, LogConfig, LogLevel};
use datapump_ingest::aws::AwsClients;
use datapump_ingest::pipeline::{FileOutcome, Pipeline, PipelineOptions};
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "datapump-poller")]
#[command(
    author,
    version,
    about = "Reads landed file paths from SQS and pumps each file to Kinesis"
)]
struct Cli {
    /// SQS queue name carrying file paths
    #[arg(long, env = "DATAPUMP_QUEUE")]
    queue_name: String,

    /// Name of the DynamoDB config table
    #[arg(long, env = "DATAPUMP_CONFIG_TABLE", default_value = "clickstream_config")]
    config: String,

    /// Name of the DynamoDB metadata (lifecycle) table
    #[arg(long, env = "DATAPUMP_META_TABLE", default_value = "streaming_metadata")]
    metastore: String,

    /// Service identifier, the partition key of the config table
    #[arg(long, env = "DATAPUMP_SERVICE", default_value = "lambda")]
    service: String,

    /// Shard count of the destination stream
    #[arg(long, default_value_t = 1)]
    shard_count: u32,

    /// Skip files already marked processed_and_sent_to_kds
    #[arg(long)]
    skip_processed: bool,

    /// Seconds to sleep between polls
    #[arg(long, default_value_t = 60)]
    poll_interval: u64,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env()?;
    log_config.log_file_prefix = "datapump-poller".to_string();
    if cli.verbose {
        log_config.level = LogLevel::Debug;
    }
    init_logging(&log_config)?;

    let runtime = Runtime::new()?;
    let shared = runtime.block_on(aws_config::load_defaults(aws_config::BehaviorVersion::latest()));
    let sqs = aws_sdk_sqs::Client::new(&shared);

    let queue_url = runtime
        .block_on(sqs.get_queue_url().queue_name(&cli.queue_name).send())
        .with_context(|| format!("failed to resolve queue '{}'", cli.queue_name))?
        .queue_url()
        .context("queue URL missing from response")?
        .to_string();
    info!(queue = %cli.queue_name, url = %queue_url, "polling queue");

    let clients = AwsClients::connect(&runtime, &cli.config, &cli.metastore)?;
    let pipeline = Pipeline::new(
        clients,
        PipelineOptions {
            shard_count: cli.shard_count,
            skip_processed: cli.skip_processed,
        },
    );

    loop {
        let response = runtime
            .block_on(
                sqs.receive_message()
                    .queue_url(&queue_url)
                    .max_number_of_messages(1)
                    .wait_time_seconds(10)
                    .send(),
            )
            .context("failed to receive from queue")?;

        for message in response.messages() {
            let Some(file_path) = message.body() else {
                warn!("discarding message with empty body");
                continue;
            };
            info!(file = %file_path, "received file path");

            match pipeline.run_file(&cli.service, file_path)? {
                FileOutcome::Completed { rows } => info!(rows, file = %file_path, "file processed"),
                FileOutcome::Skipped => info!(file = %file_path, "file already processed"),
                FileOutcome::Failed { status, reason } => {
                    // The failure is already on the lifecycle record; the
                    // loop moves on to the next message.
                    error!(%status, %reason, file = %file_path, "file failed")
                },
            }

            if let Some(receipt) = message.receipt_handle() {
                runtime
                    .block_on(
                        sqs.delete_message()
                            .queue_url(&queue_url)
                            .receipt_handle(receipt)
                            .send(),
                    )
                    .context("failed to delete queue message")?;
            }
        }

        std::thread::sleep(Duration::from_secs(cli.poll_interval));
    }
}
