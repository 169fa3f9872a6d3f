use std::time::Duration;
use crate::error::AppError;

/// Configuration for exponential backoff retry logic
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included (default: 3)
    pub max_attempts: u32,
    /// Delay before the second attempt in milliseconds (default: 1000ms)
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::for_database()
    }
}

impl RetryConfig {
    /// Database retry policy: waits 1s, 2s, 4s, ... between attempts, uncapped.
    pub fn for_database() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_base_delay(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    /// Delay to wait after the failed attempt `attempt` (counted from 0):
    /// `base_delay * 2^attempt`, saturating instead of overflowing.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}

/// Only failures raised by the database layer are worth another attempt.
/// Validation, conflicts and auth failures would fail the same way again.
pub fn is_retryable_error(error: &AppError) -> bool {
    error.is_database_error()
}
