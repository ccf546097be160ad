//! Bounded retries for flaky external commands
//!
//! Registry pushes back off linearly; the buildkit readiness probe polls at
//! a fixed interval. Both run through [`RetryExecutor`], which stops early
//! when a [`RetryPredicate`] says a failure is permanent.
//!
//! ```rust,no_run
//! use kiln_core::retry::{ClosurePredicate, RetryExecutorBuilder, RetryPolicy, TracingObserver};
//!
//! # async fn push() -> Result<(), std::io::Error> { Ok(()) }
//! # async fn example() {
//! let result = RetryExecutorBuilder::new()
//!     .with_policy(RetryPolicy::linear(3, 2000))
//!     .with_predicate(ClosurePredicate::new(|e: &std::io::Error| {
//!         e.kind() != std::io::ErrorKind::PermissionDenied
//!     }))
//!     .with_observer(TracingObserver::new("push"))
//!     .build()
//!     .execute(push)
//!     .await;
//! # }
//! ```

mod error;
mod executor;
mod observer;
mod policy;
mod predicate;

pub use error::RetryError;
pub use executor::{RetryExecutor, RetryExecutorBuilder};
pub use observer::{NoOpObserver, RetryObserver, TracingObserver};
pub use policy::{Backoff, RetryPolicy};
pub use predicate::{AlwaysRetry, ClosurePredicate, RetryPredicate};
