use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Helper to create an exponential backoff strategy: base * 2^(attempt-1)
/// with an optional maximum delay
pub fn exponential_backoff(base_ms: u64, max_ms: Option<u64>) -> impl Fn(u32) -> Duration + Send + Sync {
    move |attempt| {
        let exponent = attempt.saturating_sub(1).min(32);
        let delay = base_ms.saturating_mul(2u64.saturating_pow(exponent));
        match max_ms {
            Some(max) => Duration::from_millis(std::cmp::min(delay, max)),
            None => Duration::from_millis(delay),
        }
    }
}

/// Helper to add jitter to any backoff function
pub fn with_jitter<F>(backoff_fn: F) -> impl Fn(u32) -> Duration + Send + Sync
where
    F: Fn(u32) -> Duration + Send + Sync,
{
    move |attempt| {
        let delay = backoff_fn(attempt);
        // Add up to 25% jitter to prevent thundering herd
        let jitter_factor = fastrand::f64() * 0.25;
        let jitter_ms = (delay.as_millis() as f64 * jitter_factor) as u64;
        delay + Duration::from_millis(jitter_ms)
    }
}

/// Backoff applied between job retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryBackoff {
    /// Delay before the first retry
    pub base_ms: u64,
    /// Upper bound for any single delay
    pub max_ms: u64,
    /// Whether to add up to 25% random jitter
    pub jitter: bool,
}

impl Default for RetryBackoff {
    fn default() -> Self {
        Self {
            base_ms: 15_000,
            max_ms: 3_600_000,
            jitter: true,
        }
    }
}

impl RetryBackoff {
    /// Delay before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let backoff = exponential_backoff(self.base_ms, Some(self.max_ms));
        if self.jitter {
            with_jitter(backoff)(retry)
        } else {
            backoff(retry)
        }
    }
}
