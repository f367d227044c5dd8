//! Notification envelope parsing
//!
//! Message bodies carry S3 event notifications:
//!
//! ```json
//! {"Records":[{"s3":{"bucket":{"name":"b1"},"object":{"key":"a%2Bb.txt"}}}]}
//! ```
//!
//! A missing or empty `Records` array is valid: S3 sends such test messages
//! when a notification target is configured, and they must still be consumed.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Decoded notification payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEnvelope {
    /// Changed objects, in notification order
    #[serde(rename = "Records", default)]
    pub records: Vec<EventRecord>,
}

impl NotificationEnvelope {
    /// True for test/heartbeat messages that name no object
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// One changed object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Event type such as `ObjectCreated:Put`, when the source includes it
    #[serde(rename = "eventName", default, skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    /// Bucket and object identification
    pub s3: S3Entity,
}

impl EventRecord {
    /// Bucket (container) name
    pub fn bucket(&self) -> &str {
        &self.s3.bucket.name
    }

    /// Object key exactly as it appeared in the notification (percent-encoded)
    pub fn raw_key(&self) -> &str {
        &self.s3.object.key
    }
}

/// `s3` member of a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Entity {
    /// Bucket holding the object
    pub bucket: S3Bucket,
    /// The object itself
    pub object: S3Object,
}

/// `s3.bucket` member of a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Bucket {
    /// Bucket name
    pub name: String,
}

/// `s3.object` member of a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Object {
    /// Percent-encoded object key
    pub key: String,
    /// Object size in bytes, when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Entity tag, when present
    #[serde(rename = "eTag", default, skip_serializing_if = "Option::is_none")]
    pub e_tag: Option<String>,
}

/// Bucket and decoded key of an object to retrieve
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    /// Bucket name
    pub bucket: String,
    /// Decoded object key
    pub key: String,
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

impl TryFrom<&EventRecord> for ObjectRef {
    type Error = Error;

    fn try_from(record: &EventRecord) -> Result<Self> {
        Ok(ObjectRef {
            bucket: record.bucket().to_string(),
            key: decode_key(record.raw_key())?,
        })
    }
}

/// Parse a message body into a [`NotificationEnvelope`]
///
/// # Errors
///
/// Returns [`Error::Parse`] if the body is not JSON or does not have the
/// notification shape.
pub fn parse_envelope(body: &str) -> Result<NotificationEnvelope> {
    Ok(serde_json::from_str(body)?)
}

/// Decode a percent-encoded object key
///
/// Follows query-string unescaping: `+` becomes a space and `%XX` becomes the
/// byte `0xXX`. Keys without `%` or `+` are returned unchanged.
///
/// # Errors
///
/// Returns [`Error::KeyDecode`] for a `%` not followed by two hex digits, or
/// when the decoded bytes are not UTF-8.
///
/// # Examples
///
/// ```
/// use s3_event_worker::envelope::decode_key;
///
/// assert_eq!(decode_key("a%2Bb.txt").unwrap(), "a+b.txt");
/// assert_eq!(decode_key("my+photo%20(1).jpg").unwrap(), "my photo (1).jpg");
/// assert!(decode_key("100%").is_err());
/// ```
pub fn decode_key(raw: &str) -> Result<String> {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes.len() > i + 2
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !valid {
                return Err(Error::KeyDecode {
                    key: raw.to_string(),
                    reason: format!("invalid escape at byte {i}"),
                });
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    // '+' must be replaced before unescaping so that "%2B" stays a literal plus
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .map_err(|e| Error::KeyDecode {
            key: raw.to_string(),
            reason: e.to_string(),
        })
}
