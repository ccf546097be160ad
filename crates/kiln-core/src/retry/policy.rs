//! How many attempts to make and how long to wait between them

use std::time::Duration;

/// Wait between two attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Retry immediately
    None,
    /// Same wait after every failure
    Fixed(Duration),
    /// Wait `n * step` after the `n`th failure
    Linear(Duration),
}

/// Attempt bound plus backoff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts including the first; zero still runs once
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Single attempt, no retry
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            backoff: Backoff::None,
        }
    }

    pub fn linear(max_attempts: u32, step_ms: u64) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Linear(Duration::from_millis(step_ms)),
        }
    }

    pub fn fixed(max_attempts: u32, delay_ms: u64) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Fixed(Duration::from_millis(delay_ms)),
        }
    }

    /// Attempts actually made when every one fails
    pub fn attempt_limit(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Wait after the 1-indexed `failed_attempt`
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        match self.backoff {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed(delay) => delay,
            Backoff::Linear(step) => step.saturating_mul(failed_attempt.max(1)),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::once()
    }
}
