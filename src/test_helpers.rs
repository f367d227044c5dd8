//! Shared in-memory test doubles for the queue, store and processor seams.

use crate::envelope::ObjectRef;
use crate::error::{Error, Result};
use crate::processor::ObjectProcessor;
use crate::queue::{MessageQueue, QueueMessage};
use crate::store::ObjectStore;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Build a queue message with a receipt handle derived from `id`
pub(crate) fn message(id: &str, body: &str) -> QueueMessage {
    QueueMessage {
        message_id: Some(id.to_string()),
        body: body.to_string(),
        receipt_handle: format!("receipt-{id}"),
    }
}

/// Build an S3 notification body naming `(bucket, raw_key)` pairs
pub(crate) fn notification(records: &[(&str, &str)]) -> String {
    let records: Vec<serde_json::Value> = records
        .iter()
        .map(|(bucket, key)| {
            serde_json::json!({
                "eventName": "ObjectCreated:Put",
                "s3": {"bucket": {"name": bucket}, "object": {"key": key}}
            })
        })
        .collect();
    serde_json::json!({ "Records": records }).to_string()
}

/// Queue returning scripted receive results and recording deletes
#[derive(Default)]
pub(crate) struct MockQueue {
    receives: Mutex<VecDeque<Result<Vec<QueueMessage>>>>,
    receive_args: Mutex<Vec<(i32, Duration)>>,
    deleted: Mutex<Vec<String>>,
    fail_deletes: bool,
}

impl MockQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing_deletes() -> Self {
        Self {
            fail_deletes: true,
            ..Self::default()
        }
    }

    pub(crate) fn push_receive(&self, result: Result<Vec<QueueMessage>>) {
        self.receives.lock().unwrap().push_back(result);
    }

    pub(crate) fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub(crate) fn receive_calls(&self) -> u32 {
        self.receive_args.lock().unwrap().len() as u32
    }

    /// `(max_messages, wait_time)` of every receive call so far
    pub(crate) fn receive_args(&self) -> Vec<(i32, Duration)> {
        self.receive_args.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageQueue for MockQueue {
    async fn receive(&self, max_messages: i32, wait_time: Duration) -> Result<Vec<QueueMessage>> {
        self.receive_args
            .lock()
            .unwrap()
            .push((max_messages, wait_time));
        let next = self.receives.lock().unwrap().pop_front();
        match next {
            Some(result) => result,
            None => {
                // Behave like an idle long poll
                tokio::time::sleep(wait_time.min(Duration::from_millis(5))).await;
                Ok(Vec::new())
            }
        }
    }

    async fn delete(&self, receipt_handle: &str) -> Result<()> {
        self.deleted
            .lock()
            .unwrap()
            .push(receipt_handle.to_string());
        if self.fail_deletes {
            Err(Error::Queue("simulated delete failure".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Store serving objects from memory and recording download requests
#[derive(Default)]
pub(crate) struct MockStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    hanging: Mutex<HashSet<String>>,
    requests: Mutex<Vec<(String, String)>>,
}

impl MockStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_object(self, bucket: &str, key: &str, data: &[u8]) -> Self {
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), data.to_vec());
        self
    }

    /// Downloads of `key` never complete
    pub(crate) fn with_hanging_key(self, key: &str) -> Self {
        self.hanging.lock().unwrap().insert(key.to_string());
        self
    }

    pub(crate) fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for MockStore {
    async fn download(
        &self,
        bucket: &str,
        key: &str,
        writer: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<u64> {
        self.requests
            .lock()
            .unwrap()
            .push((bucket.to_string(), key.to_string()));

        let hang = self.hanging.lock().unwrap().contains(key);
        if hang {
            std::future::pending::<()>().await;
        }

        let data = self
            .objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned();
        let Some(data) = data else {
            return Err(Error::Storage(format!("NoSuchKey: s3://{bucket}/{key}")));
        };
        writer.write_all(&data).await?;
        writer.flush().await?;
        Ok(data.len() as u64)
    }
}

/// Processor recording every object it sees
#[derive(Default)]
pub(crate) struct RecordingProcessor {
    seen: Mutex<Vec<(ObjectRef, PathBuf)>>,
    fail: bool,
}

impl RecordingProcessor {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) fn seen(&self) -> Vec<(ObjectRef, PathBuf)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectProcessor for RecordingProcessor {
    async fn process(&self, object: &ObjectRef, path: &Path) -> Result<()> {
        self.seen
            .lock()
            .unwrap()
            .push((object.clone(), path.to_path_buf()));
        if self.fail {
            Err(Error::Process("simulated processing failure".to_string()))
        } else {
            Ok(())
        }
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
