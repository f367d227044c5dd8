//! Message queue abstraction and the SQS implementation

use crate::error::{Error, Result};
use async_trait::async_trait;
use aws_sdk_sqs::error::{DisplayErrorContext, ProvideErrorMetadata};
use std::time::Duration;

/// One received delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    /// Queue-assigned message ID, for logging
    pub message_id: Option<String>,
    /// Message body (an S3 event notification)
    pub body: String,
    /// Token identifying this delivery; required to delete it
    pub receipt_handle: String,
}

/// Operations the worker needs from the message queue
///
/// Authentication, client-side retries and connection management belong to
/// the implementation.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Long-poll for up to `max_messages`, blocking at most `wait_time`
    ///
    /// An empty vector means the wait elapsed without a delivery.
    async fn receive(&self, max_messages: i32, wait_time: Duration) -> Result<Vec<QueueMessage>>;

    /// Acknowledge a delivery so it is not redelivered
    async fn delete(&self, receipt_handle: &str) -> Result<()>;
}

/// [`MessageQueue`] backed by an SQS queue
#[derive(Debug, Clone)]
pub struct SqsQueue {
    client: aws_sdk_sqs::Client,
    queue_url: String,
}

impl SqsQueue {
    /// Wrap an SQS client bound to one queue URL
    pub fn new(client: aws_sdk_sqs::Client, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
        }
    }

    /// URL of the queue this instance polls
    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }
}

#[async_trait]
impl MessageQueue for SqsQueue {
    async fn receive(&self, max_messages: i32, wait_time: Duration) -> Result<Vec<QueueMessage>> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max_messages)
            .wait_time_seconds(wait_time.as_secs().min(i32::MAX as u64) as i32)
            .send()
            .await
            .map_err(|e| {
                let code = e.code().unwrap_or("unknown").to_string();
                Error::Queue(format!(
                    "ReceiveMessage failed ({code}): {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        let mut messages = Vec::new();
        for message in output.messages.unwrap_or_default() {
            let Some(receipt_handle) = message.receipt_handle else {
                // Undeletable; it reappears after the visibility timeout
                tracing::warn!(
                    message_id = ?message.message_id,
                    "Received message without receipt handle, ignoring"
                );
                continue;
            };
            messages.push(QueueMessage {
                message_id: message.message_id,
                body: message.body.unwrap_or_default(),
                receipt_handle,
            });
        }
        Ok(messages)
    }

    async fn delete(&self, receipt_handle: &str) -> Result<()> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| {
                let code = e.code().unwrap_or("unknown").to_string();
                Error::Queue(format!(
                    "DeleteMessage failed ({code}): {}",
                    DisplayErrorContext(&e)
                ))
            })?;
        Ok(())
    }
}
