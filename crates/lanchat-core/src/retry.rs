use std::time::Duration;

use crate::error::GatewayError;

/// Capped exponential backoff with a bounded number of attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    base_delay_ms: u64,
    max_delay_ms: u64,
    max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(base_delay_ms: u64, max_delay_ms: u64, max_attempts: u32) -> Self {
        Self {
            base_delay_ms,
            max_delay_ms: max_delay_ms.max(base_delay_ms),
            max_attempts,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Same backoff curve with a different attempt budget.
    pub fn with_max_attempts(self, max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..self
        }
    }

    /// Delay before retry number `attempt` (zero-based), honoring a larger
    /// server hint.
    pub fn delay_for_attempt(&self, attempt: u32, retry_after_hint_ms: Option<u64>) -> Duration {
        let shift = attempt.min(20);
        let calculated = self.base_delay_ms.saturating_mul(1_u64 << shift);
        let hinted = retry_after_hint_ms.unwrap_or(0);
        Duration::from_millis(calculated.max(hinted).min(self.max_delay_ms))
    }

    /// Next delay after `failed_attempts` failures of a call that failed with
    /// `error`, or `None` when the budget is spent or retrying is pointless.
    pub fn next_delay(&self, failed_attempts: u32, error: &GatewayError) -> Option<Duration> {
        if failed_attempts == 0 || failed_attempts > self.max_attempts || !error.is_recoverable() {
            return None;
        }
        Some(self.delay_for_attempt(failed_attempts - 1, error.retry_after_ms))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(500, 30_000, 3)
    }
}
