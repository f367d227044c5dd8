//! Retrieval pipeline: handling of a single message from parse to acknowledgement.
//!
//! Phases:
//! 1. Parse the notification envelope
//! 2. Acknowledge notifications without records (test messages)
//! 3. Select records according to the [`RecordPolicy`]
//! 4. Decode each key and resolve its scratch path
//! 5. Stream the object into the scratch file (folder markers only create
//!    their directory)
//! 6. Run the [`ObjectProcessor`]
//! 7. Delete the message
//!
//! Any failure in phases 1 and 3-6 is logged and leaves the message on the
//! queue, so the visibility timeout makes it eligible for redelivery. A failed
//! delete is logged and otherwise ignored.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::{DownloadConfig, RecordPolicy};
use crate::destination;
use crate::envelope::{EventRecord, ObjectRef, parse_envelope};
use crate::error::{Error, Result};
use crate::processor::{NoOpProcessor, ObjectProcessor};
use crate::queue::{MessageQueue, QueueMessage};
use crate::retry::IsRetryable;
use crate::store::ObjectStore;
use crate::types::{Event, MessageOutcome, RetrievedObject};

/// Capacity of the lifecycle event channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Handles one message at a time with full failure isolation
///
/// Clients are injected, so the pipeline can run against SQS/S3 or against
/// in-memory test doubles.
#[derive(Clone)]
pub struct RetrievalPipeline {
    queue: Arc<dyn MessageQueue>,
    store: Arc<dyn ObjectStore>,
    processor: Arc<dyn ObjectProcessor>,
    scratch_dir: PathBuf,
    record_policy: RecordPolicy,
    event_tx: broadcast::Sender<Event>,
}

impl RetrievalPipeline {
    /// Create a pipeline with the [`NoOpProcessor`]
    pub fn new(
        queue: Arc<dyn MessageQueue>,
        store: Arc<dyn ObjectStore>,
        config: &DownloadConfig,
    ) -> Self {
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            queue,
            store,
            processor: Arc::new(NoOpProcessor),
            scratch_dir: config.scratch_dir.clone(),
            record_policy: config.record_policy,
            event_tx,
        }
    }

    /// Replace the downstream processor
    pub fn with_processor(mut self, processor: Arc<dyn ObjectProcessor>) -> Self {
        self.processor = processor;
        self
    }

    /// Subscribe to lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Directory objects are written to
    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    pub(crate) fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Process one message to a terminal state
    ///
    /// Never returns an error: the outcome records whether the message was
    /// acknowledged or left for redelivery. Cancelling `shutdown` abandons an
    /// in-flight download.
    pub async fn handle_message(
        &self,
        message: &QueueMessage,
        shutdown: &CancellationToken,
    ) -> MessageOutcome {
        let envelope = match parse_envelope(&message.body) {
            Ok(envelope) => envelope,
            Err(e) => return self.abandon(message, e),
        };

        if envelope.is_empty() {
            tracing::info!(
                message_id = ?message.message_id,
                "Notification has no records (likely a test message), deleting"
            );
            let acknowledged = self.acknowledge(message).await;
            return MessageOutcome::Skipped { acknowledged };
        }

        let records = self.select_records(&envelope.records);
        let mut objects = Vec::with_capacity(records.len());
        for record in records {
            if shutdown.is_cancelled() {
                return self.abandon(message, Error::ShuttingDown);
            }
            match self.retrieve(record, shutdown).await {
                Ok(object) => objects.push(object),
                Err(e) => return self.abandon(message, e),
            }
        }

        let acknowledged = self.acknowledge(message).await;
        MessageOutcome::Completed {
            objects,
            acknowledged,
        }
    }

    fn select_records<'a>(&self, records: &'a [EventRecord]) -> &'a [EventRecord] {
        match self.record_policy {
            RecordPolicy::All => records,
            RecordPolicy::FirstOnly => {
                if records.len() > 1 {
                    tracing::debug!(
                        ignored = records.len() - 1,
                        "Notification carries several records, retrieving only the first"
                    );
                }
                &records[..1]
            }
        }
    }

    async fn retrieve(
        &self,
        record: &EventRecord,
        shutdown: &CancellationToken,
    ) -> Result<RetrievedObject> {
        let object = ObjectRef::try_from(record)?;
        tracing::info!(bucket = %object.bucket, key = %object.key, "Target identified");
        self.emit(Event::TargetIdentified {
            bucket: object.bucket.clone(),
            key: object.key.clone(),
        });

        let path = destination::resolve(&self.scratch_dir, &object.key)?;
        if destination::is_folder_marker(&object.key) {
            tokio::fs::create_dir_all(&path).await?;
            tracing::info!(
                bucket = %object.bucket,
                key = %object.key,
                path = %path.display(),
                "Folder marker, created directory without downloading"
            );
            return Ok(RetrievedObject {
                object,
                path,
                bytes: 0,
            });
        }

        let bytes = self.download_to(&object, &path, shutdown).await?;
        tracing::info!(
            bucket = %object.bucket,
            key = %object.key,
            path = %path.display(),
            bytes,
            processor = self.processor.name(),
            "Download complete"
        );
        self.emit(Event::ObjectDownloaded {
            bucket: object.bucket.clone(),
            key: object.key.clone(),
            path: path.clone(),
            bytes,
        });

        self.processor.process(&object, &path).await?;

        Ok(RetrievedObject {
            object,
            path,
            bytes,
        })
    }

    /// Stream an object into `path`, removing the partial file on failure
    async fn download_to(
        &self,
        object: &ObjectRef,
        path: &Path,
        shutdown: &CancellationToken,
    ) -> Result<u64> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let result = {
            // Closed at the end of this block on every path
            let mut file = tokio::fs::File::create(path).await?;
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => Err(Error::ShuttingDown),
                res = self.store.download(&object.bucket, &object.key, &mut file) => res,
            }
        };

        if result.is_err()
            && let Err(e) = tokio::fs::remove_file(path).await
        {
            tracing::debug!(path = %path.display(), error = %e, "Could not remove partial file");
        }
        result
    }

    fn abandon(&self, message: &QueueMessage, error: Error) -> MessageOutcome {
        tracing::error!(
            message_id = ?message.message_id,
            kind = error.kind(),
            retryable = error.is_retryable(),
            error = %error,
            "Message processing failed, leaving it for redelivery"
        );
        self.emit(Event::MessageAbandoned {
            message_id: message.message_id.clone(),
            kind: error.kind().to_string(),
            error: error.to_string(),
        });
        MessageOutcome::Abandoned {
            kind: error.kind(),
            reason: error.to_string(),
        }
    }

    /// Delete the message; failures are logged, never retried
    async fn acknowledge(&self, message: &QueueMessage) -> bool {
        match self.queue.delete(&message.receipt_handle).await {
            Ok(()) => {
                tracing::info!(message_id = ?message.message_id, "Message deleted");
                self.emit(Event::MessageDeleted {
                    message_id: message.message_id.clone(),
                });
                true
            }
            Err(e) => {
                tracing::error!(
                    message_id = ?message.message_id,
                    error = %e,
                    "Failed to delete message, it may be redelivered"
                );
                self.emit(Event::DeleteFailed {
                    message_id: message.message_id.clone(),
                    error: e.to_string(),
                });
                false
            }
        }
    }
}
