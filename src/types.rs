//! Core types and events

use crate::envelope::ObjectRef;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// An object written to the scratch directory
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievedObject {
    /// Bucket and decoded key
    pub object: ObjectRef,
    /// Where the bytes were written
    pub path: PathBuf,
    /// Number of bytes written
    pub bytes: u64,
}

/// Terminal state of one message
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Every selected object was retrieved and processed
    Completed {
        /// Objects retrieved for this message
        objects: Vec<RetrievedObject>,
        /// Whether the delete call succeeded
        acknowledged: bool,
    },
    /// Notification named no objects (test or heartbeat message)
    Skipped {
        /// Whether the delete call succeeded
        acknowledged: bool,
    },
    /// Processing failed; the message stays on the queue for redelivery
    Abandoned {
        /// Short error label (see [`crate::Error::kind`])
        kind: &'static str,
        /// Error message
        reason: String,
    },
}

impl MessageOutcome {
    /// True if a delete call was issued for the message
    pub fn delete_attempted(&self) -> bool {
        !matches!(self, MessageOutcome::Abandoned { .. })
    }
}

/// Event emitted during the message lifecycle
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A message was received from the queue
    MessageReceived {
        /// Queue-assigned message ID
        #[serde(skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
    },

    /// The notification was parsed and names an object to retrieve
    TargetIdentified {
        /// Bucket name
        bucket: String,
        /// Decoded object key
        key: String,
    },

    /// An object was written to the scratch directory
    ObjectDownloaded {
        /// Bucket name
        bucket: String,
        /// Decoded object key
        key: String,
        /// Local path
        path: PathBuf,
        /// Bytes written
        bytes: u64,
    },

    /// The message was left on the queue after a failure
    MessageAbandoned {
        /// Queue-assigned message ID
        #[serde(skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
        /// Short error label
        kind: String,
        /// Error message
        error: String,
    },

    /// The message was deleted from the queue
    MessageDeleted {
        /// Queue-assigned message ID
        #[serde(skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
    },

    /// Deleting the message failed; it may be redelivered
    DeleteFailed {
        /// Queue-assigned message ID
        #[serde(skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
        /// Error message
        error: String,
    },

    /// A receive call failed and the loop is backing off
    ReceiveFailed {
        /// Error message
        error: String,
        /// Delay before the next receive, in milliseconds
        retry_in_ms: u64,
    },
}
