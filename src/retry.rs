//! Exponential backoff with jitter for the receive loop
//!
//! A failed receive must not be retried in a tight loop: during a queue outage
//! that would hammer the endpoint. [`Backoff`] hands out growing, jittered
//! delays and is reset as soon as a receive succeeds.
//!
//! # Example
//!
//! ```
//! use s3_event_worker::config::BackoffConfig;
//! use s3_event_worker::retry::Backoff;
//! use std::time::Duration;
//!
//! let mut backoff = Backoff::new(BackoffConfig {
//!     initial_delay: Duration::from_millis(100),
//!     max_delay: Duration::from_secs(1),
//!     multiplier: 2.0,
//!     jitter: false,
//! });
//!
//! assert_eq!(backoff.next_delay(), Duration::from_millis(100));
//! assert_eq!(backoff.next_delay(), Duration::from_millis(200));
//! backoff.reset();
//! assert_eq!(backoff.next_delay(), Duration::from_millis(100));
//! ```

use crate::config::BackoffConfig;
use crate::error::Error;
use rand::Rng;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (network timeouts, throttling, connection reset) should return `true`.
/// Permanent failures (bad configuration, malformed payloads) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            // Service calls fail transiently during outages and throttling
            Error::Queue(_) | Error::Storage(_) => true,
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
            ),
            // Payload and key errors will fail the same way on every delivery
            Error::Parse(_) | Error::KeyDecode { .. } | Error::UnsafeKey { .. } => false,
            Error::Config { .. } => false,
            // Processor errors are opaque; let redelivery decide
            Error::Process(_) => true,
            Error::ShuttingDown => false,
        }
    }
}

/// Stateful exponential backoff
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    current: Duration,
    attempts: u32,
}

impl Backoff {
    /// Create a backoff starting at `config.initial_delay`
    pub fn new(config: BackoffConfig) -> Self {
        let current = config.initial_delay;
        Self {
            config,
            current,
            attempts: 0,
        }
    }

    /// Delay to wait before the next attempt; advances the exponential schedule
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current.min(self.config.max_delay);
        self.attempts = self.attempts.saturating_add(1);

        let next = Duration::from_secs_f64(delay.as_secs_f64() * self.config.multiplier);
        self.current = next.min(self.config.max_delay);

        if self.config.jitter {
            add_jitter(delay).min(self.config.max_delay)
        } else {
            delay
        }
    }

    /// Number of delays handed out since the last reset
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Return to the initial delay after a successful attempt
    pub fn reset(&mut self) {
        self.current = self.config.initial_delay;
        self.attempts = 0;
    }
}

/// Add random jitter to a delay to prevent thundering herd
///
/// Jitter is uniformly distributed between 0% and 100% of the delay, so the
/// result lies between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    let jittered_secs = delay.as_secs_f64() * (1.0 + jitter_factor);
    Duration::from_secs_f64(jittered_secs)
}
