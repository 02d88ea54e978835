//! Retry backoff policy for propagation messages.

use std::time::Duration;

/// Default ceiling for the retry delay (10 minutes).
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(600);

/// Maps a retry attempt number to the delay before redelivery.
///
/// The delay is binary exponential, `2^retry_count` seconds, capped at
/// [`RetryPolicy::max_delay`]. Original dispatches (retry count 0) are never
/// delayed by the bus; see [`crate::RetryDelayBus`].
///
/// Retries are unbounded unless [`RetryPolicy::max_retries`] is set. The
/// retry count itself keeps growing; only the delay is capped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum delay between two attempts.
    pub max_delay: Duration,
    /// Highest retry count a message may reach, `None` for no limit.
    pub max_retries: Option<u32>,
}

impl RetryPolicy {
    /// Creates an unbounded policy with the given delay ceiling.
    pub fn new(max_delay: Duration) -> Self {
        Self {
            max_delay,
            max_retries: None,
        }
    }

    /// Sets the delay ceiling.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Caps the number of retries.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Returns the delay for the given retry count: `min(max_delay, 2^n s)`.
    pub fn delay_for_retry(&self, retry_count: u32) -> Duration {
        let secs = 1u64.checked_shl(retry_count).unwrap_or(u64::MAX);
        Duration::from_secs(secs).min(self.max_delay)
    }

    /// Returns true if a message carrying `retry_count` may still be
    /// dispatched.
    pub fn allows(&self, retry_count: u32) -> bool {
        self.max_retries.map_or(true, |max| retry_count <= max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DELAY)
    }
}
