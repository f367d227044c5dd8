//! Configuration types for s3-event-worker

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Environment variable holding the queue URL (required)
pub const ENV_QUEUE_URL: &str = "SQS_QUEUE_URL";
/// Environment variable overriding the scratch directory
pub const ENV_SCRATCH_DIR: &str = "SCRATCH_DIR";
/// Environment variable overriding the long-poll wait time in seconds
pub const ENV_WAIT_TIME_SECONDS: &str = "SQS_WAIT_TIME_SECONDS";
/// Environment variable overriding the receive batch size
pub const ENV_MAX_MESSAGES: &str = "SQS_MAX_MESSAGES";
/// Environment variable selecting the [`RecordPolicy`] (`first` or `all`)
pub const ENV_RECORD_POLICY: &str = "RECORD_POLICY";
/// Environment variable overriding the first receive backoff delay
pub const ENV_BACKOFF_INITIAL_MS: &str = "RECEIVE_BACKOFF_INITIAL_MS";
/// Environment variable overriding the receive backoff cap
pub const ENV_BACKOFF_MAX_MS: &str = "RECEIVE_BACKOFF_MAX_MS";

/// Longest long-poll wait SQS accepts
const MAX_WAIT_TIME_SECS: u64 = 20;
/// Largest receive batch SQS accepts
const MAX_BATCH_SIZE: i32 = 10;

/// Queue polling configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueueConfig {
    /// URL of the queue carrying the object notifications
    pub queue_url: String,

    /// Messages requested per receive call (default: 1)
    #[serde(default = "default_max_messages")]
    pub max_messages: i32,

    /// Long-poll wait per receive call (default: 20 seconds)
    #[serde(default = "default_wait_time", with = "duration_serde")]
    pub wait_time: Duration,
}

/// How many records of a multi-record notification are retrieved
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordPolicy {
    /// Retrieve only the first record; the rest are ignored (default)
    #[default]
    FirstOnly,
    /// Retrieve every record; the message is acknowledged only if all succeed
    All,
}

impl std::str::FromStr for RecordPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" | "first_only" => Ok(RecordPolicy::FirstOnly),
            "all" => Ok(RecordPolicy::All),
            other => Err(Error::config(
                ENV_RECORD_POLICY,
                format!("unknown record policy '{other}' (expected 'first' or 'all')"),
            )),
        }
    }
}

/// Object retrieval configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Directory retrieved objects are written to (default: "/tmp")
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,

    /// Which records of a notification are retrieved
    #[serde(default)]
    pub record_policy: RecordPolicy,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            scratch_dir: default_scratch_dir(),
            record_policy: RecordPolicy::default(),
        }
    }
}

/// Backoff applied between failed receive calls
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Delay after the first failure (default: 500 milliseconds)
    #[serde(default = "default_initial_delay", with = "millis_serde")]
    pub initial_delay: Duration,

    /// Upper bound on the delay (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "millis_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Top-level worker configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Queue polling settings
    pub queue: QueueConfig,

    /// Object retrieval settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// Receive error backoff settings
    #[serde(default)]
    pub backoff: BackoffConfig,
}

impl Config {
    /// Configuration for a queue URL with every other setting at its default
    pub fn new(queue_url: impl Into<String>) -> Self {
        Self {
            queue: QueueConfig {
                queue_url: queue_url.into(),
                max_messages: default_max_messages(),
                wait_time: default_wait_time(),
            },
            download: DownloadConfig::default(),
            backoff: BackoffConfig::default(),
        }
    }

    /// Load configuration from process environment variables
    ///
    /// `SQS_QUEUE_URL` is required; every other variable is optional.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let queue_url = lookup(ENV_QUEUE_URL)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::config(ENV_QUEUE_URL, "environment variable is not set"))?;

        let mut config = Config::new(queue_url);

        if let Some(dir) = lookup(ENV_SCRATCH_DIR).filter(|v| !v.trim().is_empty()) {
            config.download.scratch_dir = PathBuf::from(dir.trim());
        }
        if let Some(secs) = parse_var::<u64>(&lookup, ENV_WAIT_TIME_SECONDS)? {
            config.queue.wait_time = Duration::from_secs(secs.min(MAX_WAIT_TIME_SECS));
        }
        if let Some(max) = parse_var::<i32>(&lookup, ENV_MAX_MESSAGES)? {
            config.queue.max_messages = max.clamp(1, MAX_BATCH_SIZE);
        }
        if let Some(policy) = lookup(ENV_RECORD_POLICY) {
            config.download.record_policy = policy.parse()?;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, ENV_BACKOFF_INITIAL_MS)? {
            config.backoff.initial_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, ENV_BACKOFF_MAX_MS)? {
            config.backoff.max_delay = Duration::from_millis(ms);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check invariants that serde defaults cannot express
    pub fn validate(&self) -> Result<()> {
        if self.queue.queue_url.trim().is_empty() {
            return Err(Error::config("queue_url", "queue URL must not be empty"));
        }
        if !(1..=MAX_BATCH_SIZE).contains(&self.queue.max_messages) {
            return Err(Error::config(
                "max_messages",
                format!("max_messages must be between 1 and {MAX_BATCH_SIZE}"),
            ));
        }
        if self.queue.wait_time > Duration::from_secs(MAX_WAIT_TIME_SECS) {
            return Err(Error::config(
                "wait_time",
                format!("wait_time must not exceed {MAX_WAIT_TIME_SECS} seconds"),
            ));
        }
        if self.backoff.multiplier < 1.0 {
            return Err(Error::config(
                "multiplier",
                "backoff multiplier must be at least 1.0",
            ));
        }
        if self.backoff.max_delay < self.backoff.initial_delay {
            return Err(Error::config(
                ENV_BACKOFF_MAX_MS,
                "maximum backoff delay must not be shorter than the initial delay",
            ));
        }
        Ok(())
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::config(key, format!("invalid value '{raw}': {e}"))),
    }
}

fn default_max_messages() -> i32 {
    1
}

fn default_wait_time() -> Duration {
    Duration::from_secs(MAX_WAIT_TIME_SECS)
}

fn default_scratch_dir() -> PathBuf {
    PathBuf::from("/tmp")
}

fn default_initial_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds)
mod millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_queue_url_is_fatal() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        match err {
            Error::Config { key, .. } => assert_eq!(key.as_deref(), Some(ENV_QUEUE_URL)),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn blank_queue_url_is_fatal() {
        let err = Config::from_lookup(lookup_from(&[(ENV_QUEUE_URL, "   ")])).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn defaults_match_reference_worker() {
        let config = Config::from_lookup(lookup_from(&[(
            ENV_QUEUE_URL,
            "https://sqs.eu-west-1.amazonaws.com/123/uploads",
        )]))
        .unwrap();

        assert_eq!(
            config.queue.queue_url,
            "https://sqs.eu-west-1.amazonaws.com/123/uploads"
        );
        assert_eq!(config.queue.max_messages, 1);
        assert_eq!(config.queue.wait_time, Duration::from_secs(20));
        assert_eq!(config.download.scratch_dir, PathBuf::from("/tmp"));
        assert_eq!(config.download.record_policy, RecordPolicy::FirstOnly);
        assert!(config.backoff.jitter);
    }

    #[test]
    fn overrides_are_applied_and_clamped() {
        let config = Config::from_lookup(lookup_from(&[
            (ENV_QUEUE_URL, "q"),
            (ENV_SCRATCH_DIR, "/var/scratch"),
            (ENV_WAIT_TIME_SECONDS, "45"),
            (ENV_MAX_MESSAGES, "25"),
            (ENV_RECORD_POLICY, "all"),
            (ENV_BACKOFF_INITIAL_MS, "100"),
            (ENV_BACKOFF_MAX_MS, "2000"),
        ]))
        .unwrap();

        assert_eq!(config.download.scratch_dir, PathBuf::from("/var/scratch"));
        assert_eq!(config.queue.wait_time, Duration::from_secs(20));
        assert_eq!(config.queue.max_messages, 10);
        assert_eq!(config.download.record_policy, RecordPolicy::All);
        assert_eq!(config.backoff.initial_delay, Duration::from_millis(100));
        assert_eq!(config.backoff.max_delay, Duration::from_secs(2));
    }

    #[test]
    fn non_numeric_override_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[
            (ENV_QUEUE_URL, "q"),
            (ENV_MAX_MESSAGES, "many"),
        ]))
        .unwrap_err();
        match err {
            Error::Config { key, message } => {
                assert_eq!(key.as_deref(), Some(ENV_MAX_MESSAGES));
                assert!(message.contains("many"), "message: {message}");
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_record_policy_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[
            (ENV_QUEUE_URL, "q"),
            (ENV_RECORD_POLICY, "some"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn backoff_cap_below_initial_delay_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[
            (ENV_QUEUE_URL, "q"),
            (ENV_BACKOFF_INITIAL_MS, "5000"),
            (ENV_BACKOFF_MAX_MS, "100"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"queue":{"queue_url":"q","wait_time":5}}"#).unwrap();
        assert_eq!(config.queue.wait_time, Duration::from_secs(5));
        assert_eq!(config.queue.max_messages, 1);
        assert_eq!(config.backoff.initial_delay, Duration::from_millis(500));
        assert_eq!(config.download.record_policy, RecordPolicy::FirstOnly);
        config.validate().unwrap();
    }
}
