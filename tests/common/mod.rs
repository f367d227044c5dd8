//! Common test utilities for s3-event-worker integration tests

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use s3_event_worker::{Error, MessageQueue, ObjectStore, QueueMessage, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Queue with scripted receives that records every delete
#[derive(Default)]
pub struct ScriptedQueue {
    pending: Mutex<VecDeque<QueueMessage>>,
    deletes: Mutex<Vec<String>>,
}

impl ScriptedQueue {
    pub fn with_messages(messages: Vec<QueueMessage>) -> Self {
        Self {
            pending: Mutex::new(messages.into()),
            ..Self::default()
        }
    }

    pub fn deletes(&self) -> Vec<String> {
        self.deletes.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageQueue for ScriptedQueue {
    async fn receive(&self, max_messages: i32, wait_time: Duration) -> Result<Vec<QueueMessage>> {
        let batch: Vec<QueueMessage> = {
            let mut pending = self.pending.lock().unwrap();
            let n = (max_messages.max(0) as usize).min(pending.len());
            pending.drain(..n).collect()
        };
        if batch.is_empty() {
            tokio::time::sleep(wait_time.min(Duration::from_millis(5))).await;
        }
        Ok(batch)
    }

    async fn delete(&self, receipt_handle: &str) -> Result<()> {
        self.deletes
            .lock()
            .unwrap()
            .push(receipt_handle.to_string());
        Ok(())
    }
}

/// In-memory object store; unknown objects fail like a missing key
#[derive(Default)]
pub struct MemoryStore {
    objects: HashMap<(String, String), Vec<u8>>,
    downloads: Mutex<Vec<(String, String)>>,
}

impl MemoryStore {
    pub fn insert(mut self, bucket: &str, key: &str, data: &[u8]) -> Self {
        self.objects
            .insert((bucket.to_string(), key.to_string()), data.to_vec());
        self
    }

    pub fn downloads(&self) -> Vec<(String, String)> {
        self.downloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn download(
        &self,
        bucket: &str,
        key: &str,
        writer: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<u64> {
        self.downloads
            .lock()
            .unwrap()
            .push((bucket.to_string(), key.to_string()));
        let data = self
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .ok_or_else(|| Error::Storage(format!("NoSuchKey: {bucket}/{key}")))?;
        writer.write_all(data).await?;
        writer.flush().await?;
        Ok(data.len() as u64)
    }
}

pub fn message(id: &str, body: &str) -> QueueMessage {
    QueueMessage {
        message_id: Some(id.to_string()),
        body: body.to_string(),
        receipt_handle: format!("rh-{id}"),
    }
}
