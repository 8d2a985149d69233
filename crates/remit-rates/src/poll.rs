//! Bounded poll-retry policy for results that render asynchronously.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How many times to look for a result and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    #[serde(with = "crate::config::millis")]
    pub interval: Duration,
    /// Multiplier applied to the delay after each failed attempt (1.0 = fixed).
    #[serde(default = "default_backoff")]
    pub backoff: f64,
}

fn default_backoff() -> f64 {
    1.0
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            interval: Duration::from_secs(2),
            backoff: 1.0,
        }
    }
}

impl PollPolicy {
    pub fn fixed(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            backoff: 1.0,
        }
    }

    /// Zero-delay policy, for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::fixed(max_attempts, Duration::ZERO)
    }

    /// Delay to sleep after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self.backoff.max(1.0).powi(attempt.saturating_sub(1) as i32);
        Duration::from_nanos((self.interval.as_nanos() as f64 * factor).round() as u64)
    }

    /// Attempt budget, never less than one.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Sleep after a failed attempt; returns `false` once the budget is spent.
    pub async fn pause(&self, attempt: u32) -> bool {
        if attempt >= self.attempts() {
            return false;
        }
        let delay = self.delay_after(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        true
    }
}
