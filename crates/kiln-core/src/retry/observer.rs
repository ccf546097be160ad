//! Hooks into the retry loop

use std::error::Error;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Notified as a retry loop progresses; every hook defaults to nothing
pub trait RetryObserver: Send + Sync {
    /// `attempt` failed and the next one starts after `delay`
    fn on_retry(&self, attempt: u32, error: &dyn Error, delay: Duration) {
        let _ = (attempt, error, delay);
    }

    /// The loop stopped on `error`; `retryable` is false for permanent failures
    fn on_give_up(&self, attempt: u32, error: &dyn Error, retryable: bool) {
        let _ = (attempt, error, retryable);
    }

    fn on_success(&self, attempt: u32) {
        let _ = attempt;
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl RetryObserver for NoOpObserver {}

/// Logs retries of a named operation
#[derive(Debug, Clone)]
pub struct TracingObserver {
    operation: String,
}

impl TracingObserver {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
        }
    }
}

impl RetryObserver for TracingObserver {
    fn on_retry(&self, attempt: u32, error: &dyn Error, delay: Duration) {
        warn!(
            "{} failed (attempt {}): {}; retrying in {}s",
            self.operation,
            attempt,
            error,
            delay.as_secs()
        );
    }

    fn on_give_up(&self, attempt: u32, error: &dyn Error, retryable: bool) {
        if retryable {
            warn!("{} failed after {} attempt(s): {}", self.operation, attempt, error);
        } else {
            debug!("{} failed permanently: {}", self.operation, error);
        }
    }

    fn on_success(&self, attempt: u32) {
        if attempt > 1 {
            info!("{} succeeded on attempt {}", self.operation, attempt);
        }
    }
}
