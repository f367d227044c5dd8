//! Object store abstraction and the S3 implementation

use crate::error::{Error, Result};
use async_trait::async_trait;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata};
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Operations the worker needs from the object store
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stream the object `key` in `bucket` into `writer`
    ///
    /// Returns the number of bytes written. The writer is flushed on success;
    /// on error it may hold a partial object.
    async fn download(
        &self,
        bucket: &str,
        key: &str,
        writer: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<u64>;
}

/// [`ObjectStore`] backed by S3
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    /// Wrap an S3 client
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn download(
        &self,
        bucket: &str,
        key: &str,
        writer: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<u64> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let code = e.code().unwrap_or("unknown").to_string();
                Error::Storage(format!(
                    "GetObject s3://{bucket}/{key} failed ({code}): {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        if let Some(length) = output.content_length {
            tracing::debug!(bucket, key, content_length = length, "Streaming object body");
        }

        let reader = output.body.into_async_read();
        tokio::pin!(reader);
        let written = tokio::io::copy(&mut reader, writer)
            .await
            .map_err(|e| stream_error(bucket, key, e))?;
        writer.flush().await?;

        Ok(written)
    }
}

/// Classify a failure while copying the body into the local writer
///
/// The copy surfaces both network read errors and local write errors. Write
/// side kinds (disk full, permissions, read-only target) are reported as
/// [`Error::Io`] so they are not mistaken for store failures.
fn stream_error(bucket: &str, key: &str, error: std::io::Error) -> Error {
    use std::io::ErrorKind;

    match error.kind() {
        ErrorKind::StorageFull
        | ErrorKind::PermissionDenied
        | ErrorKind::ReadOnlyFilesystem
        | ErrorKind::QuotaExceeded
        | ErrorKind::WriteZero => Error::Io(error),
        _ => Error::Storage(format!(
            "streaming s3://{bucket}/{key} into scratch file failed: {error}"
        )),
    }
}
