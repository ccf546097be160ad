//! Outcome of a retry loop that never succeeded

use std::time::Duration;
use thiserror::Error;

/// Why a retried operation gave up
///
/// Either way the last failure is kept as `source`.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every allowed attempt failed with a retryable error
    #[error("gave up after {attempts} attempt(s) in {:.1}s: {source}", .total_duration.as_secs_f64())]
    Exhausted {
        attempts: u32,
        source: E,
        total_duration: Duration,
    },

    /// The predicate declared the failure permanent
    #[error("permanent failure on attempt {attempt}: {source}")]
    NonRetryable { attempt: u32, source: E },
}

impl<E> RetryError<E> {
    /// Attempts made before giving up
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } => *attempts,
            Self::NonRetryable { attempt, .. } => *attempt,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }

    pub fn is_non_retryable(&self) -> bool {
        matches!(self, Self::NonRetryable { .. })
    }
}
