//! Retry policy: failure classification and exponential backoff
//!
//! Classification reads the [`ErrorKind`](syncward_core::domain::ErrorKind)
//! the executor attached to its error. Backoff is
//! `min(base * 2^attempt, max) + uniform(0..=jitter)`.

use std::time::Duration;

use rand::Rng;
use syncward_core::config::RetryConfig;
use syncward_core::domain::{ExecutorError, SyncOperation};

/// Returns true if the failure may succeed on another attempt
pub fn is_retryable(error: &ExecutorError) -> bool {
    error.kind().is_retryable()
}

/// How a failed attempt is categorized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Retryable and budget remains
    Transient,
    /// Deterministic failure; retrying would fail identically
    Terminal,
    /// Retryable, but the attempt budget is spent
    Exhausted,
}

/// What the processing loop should do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-queue and wait `delay` before continuing
    Retry { delay: Duration },
    /// Drop the operation
    GiveUp(FailureClass),
}

/// Backoff parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    base_delay: Duration,
    max_delay: Duration,
    max_jitter: Duration,
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration, max_jitter: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            max_jitter,
        }
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn max_jitter(&self) -> Duration {
        self.max_jitter
    }

    /// Deterministic part of the delay: `min(base * 2^attempt, max)`
    pub fn capped_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let delay = Duration::from_millis(base_ms.saturating_mul(factor));
        delay.min(self.max_delay)
    }

    /// Uniform random jitter in `0..=max_jitter`
    pub fn jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }

    /// Full backoff for the retry following failed attempt number `attempt`
    ///
    /// `attempt` is the 0-based index of the attempt that just failed, taken
    /// before the failure is recorded on the operation. The first retry
    /// therefore waits `base`, the second `2 * base`, and so on up to the cap.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.capped_delay(attempt) + self.jitter()
    }

    /// Decides the fate of `op` after `error`, before the failure is recorded
    ///
    /// A remote-supplied `retry_after` hint raises the delay (never above the
    /// cap) but never lowers it.
    pub fn decide(&self, op: &SyncOperation, error: &ExecutorError) -> RetryDecision {
        if !is_retryable(error) {
            return RetryDecision::GiveUp(FailureClass::Terminal);
        }
        if !op.has_retries_left() {
            return RetryDecision::GiveUp(FailureClass::Exhausted);
        }

        // Exponent is the failed attempt's index, not the incremented count
        let mut delay = self.backoff_delay(op.attempt());
        if let Some(hint) = error.retry_after() {
            delay = delay.max(hint.min(self.max_delay));
        }
        RetryDecision::Retry { delay }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
            Duration::from_millis(config.jitter_ms),
        )
    }
}
