//! Receive loop: long-polls the queue and feeds messages to the pipeline.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, QueueConfig};
use crate::pipeline::RetrievalPipeline;
use crate::processor::ObjectProcessor;
use crate::queue::MessageQueue;
use crate::retry::{Backoff, IsRetryable};
use crate::store::ObjectStore;
use crate::types::Event;

/// Long-running consumer of object notifications
///
/// Messages are handled strictly one after another: each is driven to a
/// terminal state before the next receive call.
pub struct Worker {
    queue: Arc<dyn MessageQueue>,
    pipeline: RetrievalPipeline,
    settings: QueueConfig,
    backoff: Backoff,
}

impl Worker {
    /// Create a worker from configuration and injected clients
    pub fn new(config: &Config, queue: Arc<dyn MessageQueue>, store: Arc<dyn ObjectStore>) -> Self {
        let pipeline = RetrievalPipeline::new(queue.clone(), store, &config.download);
        Self {
            queue,
            pipeline,
            settings: config.queue.clone(),
            backoff: Backoff::new(config.backoff.clone()),
        }
    }

    /// Replace the downstream processor
    pub fn with_processor(mut self, processor: Arc<dyn ObjectProcessor>) -> Self {
        self.pipeline = self.pipeline.with_processor(processor);
        self
    }

    /// Subscribe to lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.pipeline.subscribe()
    }

    /// The pipeline messages are handed to
    pub fn pipeline(&self) -> &RetrievalPipeline {
        &self.pipeline
    }

    /// Run until `shutdown` is cancelled
    ///
    /// Receive errors never end the loop; they are logged and followed by an
    /// exponentially growing, jittered pause. Cancellation interrupts a pending
    /// receive, a backoff pause, or an in-flight download.
    pub async fn run(mut self, shutdown: CancellationToken) {
        tracing::info!(
            queue_url = %self.settings.queue_url,
            scratch_dir = %self.pipeline.scratch_dir().display(),
            "Worker started, waiting for messages"
        );

        loop {
            let received = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                res = self.queue.receive(self.settings.max_messages, self.settings.wait_time) => res,
            };

            let messages = match received {
                Ok(messages) => {
                    self.backoff.reset();
                    messages
                }
                Err(e) => {
                    let delay = self.backoff.next_delay();
                    tracing::error!(
                        error = %e,
                        retryable = e.is_retryable(),
                        attempt = self.backoff.attempts(),
                        delay_ms = delay.as_millis() as u64,
                        "Failed to receive messages, backing off"
                    );
                    self.pipeline.emit(Event::ReceiveFailed {
                        error: e.to_string(),
                        retry_in_ms: delay.as_millis() as u64,
                    });
                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(delay) => continue,
                    }
                }
            };

            for message in messages {
                // Unprocessed deliveries return to the queue after their visibility timeout
                if shutdown.is_cancelled() {
                    break;
                }
                tracing::info!(message_id = ?message.message_id, "Message received");
                self.pipeline.emit(Event::MessageReceived {
                    message_id: message.message_id.clone(),
                });
                self.pipeline.handle_message(&message, &shutdown).await;
            }
        }

        tracing::info!("Worker stopped");
    }
}
