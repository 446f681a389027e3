//! Retry policy: the per-job attempt budget and timing knobs.

use std::time::Duration;

use crate::domain::ConfigError;
use crate::policy::BackoffPolicy;

/// Immutable retry configuration for one executor.
///
/// `max_attempts` bounds executions, not retries: attempt 1 counts against
/// the budget, so `max_attempts = 1` means "try once, never retry".
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    jitter: Duration,
    per_attempt_timeout: Duration,
}

impl RetryPolicy {
    /// Validate and build a policy. Fail-fast: bad values are construction
    /// errors, not runtime surprises.
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        jitter: Duration,
        per_attempt_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        if max_attempts < 1 {
            return Err(ConfigError::MaxAttempts(max_attempts));
        }
        if per_attempt_timeout.is_zero() {
            return Err(ConfigError::PerAttemptTimeout);
        }
        Ok(Self {
            max_attempts,
            base_delay,
            jitter,
            per_attempt_timeout,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn jitter(&self) -> Duration {
        self.jitter
    }

    pub fn per_attempt_timeout(&self) -> Duration {
        self.per_attempt_timeout
    }

    /// The backoff curve this policy implies.
    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new(self.base_delay, self.jitter)
    }
}

impl Default for RetryPolicy {
    /// 4 attempts (3 retries), 500ms base delay, ±100ms jitter, 2s
    /// per-attempt timeout.
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
            jitter: Duration::from_millis(100),
            per_attempt_timeout: Duration::from_secs(2),
        }
    }
}
