//! # s3-event-worker
//!
//! Long-running worker that consumes S3 object notifications from an SQS
//! queue, downloads each referenced object into a scratch directory, hands it
//! to a pluggable processor, and acknowledges the message by deleting it.
//!
//! ## Delivery contract
//!
//! - A message is deleted only after every selected object was downloaded and
//!   processed, or when the notification names no objects at all.
//! - Any failure leaves the message on the queue; its visibility timeout makes
//!   it eligible for redelivery (and dead-lettering, if configured).
//! - A failed delete is logged and not retried, so an object may be retrieved
//!   more than once. Processors must be idempotent.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use s3_event_worker::{Config, S3ObjectStore, SqsQueue, Worker, run_with_shutdown};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let aws = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
//!
//!     let queue = SqsQueue::new(aws_sdk_sqs::Client::new(&aws), config.queue.queue_url.clone());
//!     let store = S3ObjectStore::new(aws_sdk_s3::Client::new(&aws));
//!
//!     let worker = Worker::new(&config, Arc::new(queue), Arc::new(store));
//!     run_with_shutdown(worker).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Scratch-directory path resolution
pub mod destination;
/// Notification envelope parsing and key decoding
pub mod envelope;
/// Error types
pub mod error;
/// Single-message retrieval pipeline
pub mod pipeline;
/// Pluggable processing of retrieved objects
pub mod processor;
/// Message queue abstraction
pub mod queue;
/// Backoff for the receive loop
pub mod retry;
/// Object store abstraction
pub mod store;
/// Core types and events
pub mod types;
/// Receive loop
pub mod worker;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use config::{BackoffConfig, Config, DownloadConfig, QueueConfig, RecordPolicy};
pub use envelope::{NotificationEnvelope, ObjectRef, decode_key, parse_envelope};
pub use error::{Error, Result};
pub use pipeline::RetrievalPipeline;
pub use processor::{NoOpProcessor, ObjectProcessor};
pub use queue::{MessageQueue, QueueMessage, SqsQueue};
pub use store::{ObjectStore, S3ObjectStore};
pub use types::{Event, MessageOutcome, RetrievedObject};
pub use worker::Worker;

/// Run the worker until a termination signal arrives.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// On a signal, a pending receive is abandoned and an in-flight download is
/// cancelled; its message stays on the queue.
pub async fn run_with_shutdown(worker: Worker) -> Result<()> {
    let shutdown = tokio_util::sync::CancellationToken::new();
    let trigger = shutdown.clone();
    let signal_task = tokio::spawn(async move {
        wait_for_signal().await;
        trigger.cancel();
    });

    worker.run(shutdown).await;
    signal_task.abort();
    Ok(())
}

/// Resolve once SIGTERM or SIGINT arrives
///
/// The signal only requests a stop. Whatever message is being handled at that
/// moment is not deleted, so it becomes visible again on the queue once its
/// visibility timeout lapses and another worker picks it up.
#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments (containers, tests)
    let received = match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        },
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            "SIGTERM"
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            "SIGINT"
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
            "ctrl_c"
        }
    };
    tracing::info!(
        signal = received,
        "Shutdown requested, undeleted messages are left for redelivery"
    );
}

/// Resolve once Ctrl+C arrives; see the unix variant for what that means for
/// in-flight messages
#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!(
                signal = "ctrl_c",
                "Shutdown requested, undeleted messages are left for redelivery"
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
