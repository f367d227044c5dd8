//! s3-event-worker binary: wires AWS clients from the default credential chain
//! into the worker and runs it until SIGTERM/SIGINT.

use std::process::ExitCode;
use std::sync::Arc;

use aws_config::BehaviorVersion;
use s3_event_worker::{Config, Error, Result, S3ObjectStore, SqsQueue, Worker, run_with_shutdown};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Worker exited with a fatal error");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let config = Config::from_env()?;

    let aws = aws_config::load_defaults(BehaviorVersion::latest()).await;
    if aws.region().is_none() {
        return Err(Error::config(
            "AWS_REGION",
            "no AWS region found in environment, profile or instance metadata",
        ));
    }

    tokio::fs::create_dir_all(&config.download.scratch_dir).await?;

    let queue = SqsQueue::new(
        aws_sdk_sqs::Client::new(&aws),
        config.queue.queue_url.clone(),
    );
    let store = S3ObjectStore::new(aws_sdk_s3::Client::new(&aws));

    let worker = Worker::new(&config, Arc::new(queue), Arc::new(store));
    run_with_shutdown(worker).await
}
