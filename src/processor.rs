//! Downstream processing of retrieved objects

use crate::envelope::ObjectRef;
use async_trait::async_trait;
use std::path::Path;

/// Work performed on an object after it has been written to the scratch directory
///
/// The message is acknowledged only after `process` returns `Ok`. Deliveries
/// are at-least-once, and a failed acknowledgement causes the same object to
/// be retrieved and processed again, so implementations must be idempotent.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use s3_event_worker::envelope::ObjectRef;
/// use s3_event_worker::processor::ObjectProcessor;
/// use std::path::Path;
///
/// struct SizeLogger;
///
/// #[async_trait]
/// impl ObjectProcessor for SizeLogger {
///     async fn process(&self, object: &ObjectRef, path: &Path) -> s3_event_worker::Result<()> {
///         let len = tokio::fs::metadata(path).await?.len();
///         println!("{object}: {len} bytes");
///         Ok(())
///     }
///
///     fn name(&self) -> &'static str {
///         "size-logger"
///     }
/// }
/// ```
#[async_trait]
pub trait ObjectProcessor: Send + Sync {
    /// Process the object stored at `path`
    ///
    /// # Errors
    ///
    /// Any error leaves the message on the queue for redelivery.
    async fn process(&self, object: &ObjectRef, path: &Path) -> crate::Result<()>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Processor that accepts every object without doing anything
///
/// Used when the worker only needs to mirror objects into the scratch directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpProcessor;

#[async_trait]
impl ObjectProcessor for NoOpProcessor {
    async fn process(&self, object: &ObjectRef, path: &Path) -> crate::Result<()> {
        tracing::debug!(
            bucket = %object.bucket,
            key = %object.key,
            path = %path.display(),
            "No processor configured, leaving object in scratch directory"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}
