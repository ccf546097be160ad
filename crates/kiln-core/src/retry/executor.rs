//! The retry loop

use super::error::RetryError;
use super::observer::{NoOpObserver, RetryObserver};
use super::policy::RetryPolicy;
use super::predicate::{AlwaysRetry, RetryPredicate};
use std::error::Error;
use std::future::Future;
use tokio::time::Instant;

/// Assembles a [`RetryExecutor`]
pub struct RetryExecutorBuilder<P = AlwaysRetry, O = NoOpObserver> {
    policy: RetryPolicy,
    predicate: P,
    observer: O,
}

impl RetryExecutorBuilder {
    pub fn new() -> Self {
        Self {
            policy: RetryPolicy::once(),
            predicate: AlwaysRetry,
            observer: NoOpObserver,
        }
    }
}

impl Default for RetryExecutorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, O> RetryExecutorBuilder<P, O> {
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_predicate<Q>(self, predicate: Q) -> RetryExecutorBuilder<Q, O> {
        RetryExecutorBuilder {
            policy: self.policy,
            predicate,
            observer: self.observer,
        }
    }

    pub fn with_observer<R>(self, observer: R) -> RetryExecutorBuilder<P, R> {
        RetryExecutorBuilder {
            policy: self.policy,
            predicate: self.predicate,
            observer,
        }
    }

    pub fn build(self) -> RetryExecutor<P, O> {
        RetryExecutor {
            policy: self.policy,
            predicate: self.predicate,
            observer: self.observer,
        }
    }
}

/// Runs an async operation until it succeeds, fails permanently, or runs
/// out of attempts
pub struct RetryExecutor<P, O> {
    policy: RetryPolicy,
    predicate: P,
    observer: O,
}

impl<P, O: RetryObserver> RetryExecutor<P, O> {
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Call `op` until it returns `Ok`
    ///
    /// Sleeps with `tokio::time`, so paused-clock tests do not wait.
    pub async fn execute<F, Fut, T, E>(&self, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Error + 'static,
        P: RetryPredicate<E>,
    {
        let started = Instant::now();
        let limit = self.policy.attempt_limit();

        let mut attempt = 1;
        loop {
            let error = match op().await {
                Ok(value) => {
                    self.observer.on_success(attempt);
                    return Ok(value);
                }
                Err(error) => error,
            };

            if !self.predicate.should_retry(&error) {
                self.observer.on_give_up(attempt, &error, false);
                return Err(RetryError::NonRetryable {
                    attempt,
                    source: error,
                });
            }
            if attempt >= limit {
                self.observer.on_give_up(attempt, &error, true);
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    source: error,
                    total_duration: started.elapsed(),
                });
            }

            let delay = self.policy.delay_after(attempt);
            self.observer.on_retry(attempt, &error, delay);
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
