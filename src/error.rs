//! Error types for s3-event-worker
//!
//! Every failure the worker can hit is a variant of [`Error`]. The pipeline
//! never propagates these past a single message: they are logged at the point
//! of occurrence and decide whether the message is acknowledged or left on the
//! queue for redelivery.

use thiserror::Error;

/// Result type alias for s3-event-worker operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for s3-event-worker
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The environment variable or config key that caused the error
        key: Option<String>,
    },

    /// Message body is not a valid notification envelope
    #[error("invalid notification envelope: {0}")]
    Parse(#[from] serde_json::Error),

    /// Object key could not be percent-decoded
    #[error("failed to decode object key {key:?}: {reason}")]
    KeyDecode {
        /// The raw key as it appeared in the notification
        key: String,
        /// Why decoding failed
        reason: String,
    },

    /// Object key would escape the scratch directory or is otherwise unusable as a path
    #[error("unsafe object key {key:?}: {reason}")]
    UnsafeKey {
        /// The decoded key
        key: String,
        /// Which rule the key violated
        reason: &'static str,
    },

    /// I/O error (scratch file creation, writes)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Queue service call failed (receive or delete)
    #[error("queue error: {0}")]
    Queue(String),

    /// Object store call failed
    #[error("object store error: {0}")]
    Storage(String),

    /// Downstream processing of a retrieved object failed
    #[error("processing error: {0}")]
    Process(String),

    /// Shutdown in progress - in-flight work abandoned
    #[error("shutdown in progress")]
    ShuttingDown,
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Short machine-readable label, used as a structured log field
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config",
            Error::Parse(_) => "parse",
            Error::KeyDecode { .. } => "key_decode",
            Error::UnsafeKey { .. } => "unsafe_key",
            Error::Io(_) => "io",
            Error::Queue(_) => "queue",
            Error::Storage(_) => "storage",
            Error::Process(_) => "process",
            Error::ShuttingDown => "shutting_down",
        }
    }
}
