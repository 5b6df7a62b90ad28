//! Backoff for the initial analysis load

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Exponential backoff with a cap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Delay after the first failure
    pub initial_delay_ms: u64,
    /// Upper bound for any delay
    pub max_delay_ms: u64,
    /// Growth factor per failure
    pub multiplier: u32,
    /// Failures before the session is shown as stalled
    pub max_attempts: u32,
}

impl RetryPolicy {
    /// Delay before the next attempt after `failures` consecutive failures
    #[must_use]
    pub fn delay_for(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1);
        let factor = u64::from(self.multiplier.max(1)).saturating_pow(exponent);
        let delay = self.initial_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(delay)
    }

    /// Whether the retry budget is spent
    #[inline]
    #[must_use]
    pub fn is_exhausted(&self, failures: u32) -> bool {
        failures >= self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 2_000,
            max_delay_ms: 30_000,
            multiplier: 2,
            max_attempts: 5,
        }
    }
}
