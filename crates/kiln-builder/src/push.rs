//! Pushing buildah images with retry
//!
//! buildkit pushes as part of the build, so only the buildah backend does
//! any work here.

use crate::backend::{Backend, Buildah};
use crate::digest::{BuildahPushDigest, DigestExtractor};
use crate::error::{Error, Result};
use kiln_context::sanitize_command;
use kiln_core::retry::{ClosurePredicate, RetryError, RetryExecutorBuilder, RetryPolicy, TracingObserver};
use kiln_core::types::BuildRequest;
use kiln_core::{CommandOutput, CommandRunner};
use kiln_image::DigestMap;
use std::fmt;
use tracing::{debug, info, warn};

/// Backoff step: attempt `n` waits `n * 2s` before the next one
pub const PUSH_BACKOFF_STEP_MS: u64 = 2000;

const AUTH_MARKERS: [&str; 7] = [
    "unauthorized",
    "authentication required",
    "denied",
    "403 forbidden",
    "insufficient_scope",
    "invalid username/password",
    "no basic auth credentials",
];

const TRANSIENT_MARKERS: [&str; 9] = [
    "timeout",
    "timed out",
    "connection reset",
    "connection refused",
    "temporary failure",
    "i/o timeout",
    "tls handshake",
    "unexpected eof",
    "503 service unavailable",
];

/// What kind of push failure a message describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Bad or missing credentials; retrying cannot help
    Auth,
    /// Network or registry hiccup
    Transient,
    /// Anything else; retried like a transient failure
    Unknown,
}

/// Classify push output by well-known error markers
pub fn classify_failure(message: &str) -> FailureClass {
    let lower = message.to_ascii_lowercase();
    if AUTH_MARKERS.iter().any(|m| lower.contains(m)) {
        FailureClass::Auth
    } else if TRANSIENT_MARKERS.iter().any(|m| lower.contains(m)) {
        FailureClass::Transient
    } else {
        FailureClass::Unknown
    }
}

/// A single failed push attempt
#[derive(Debug)]
pub struct PushFailure {
    pub class: FailureClass,
    pub message: String,
}

impl fmt::Display for PushFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for PushFailure {}

/// Pushes every destination of a build
pub struct PushOrchestrator<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> PushOrchestrator<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    /// Push all destinations in sorted order, returning their digests
    ///
    /// Stops at the first destination that cannot be pushed.
    pub async fn push(&self, backend: &Backend, request: &BuildRequest) -> Result<DigestMap> {
        let Backend::Buildah(buildah) = backend else {
            debug!("Push handled by the build itself");
            return Ok(DigestMap::new());
        };

        let mut digests = DigestMap::new();
        for destination in request.sorted_destinations() {
            let output = self.push_one(buildah, request, destination).await?;
            match BuildahPushDigest.extract(&output) {
                Some(digest) => {
                    info!("Pushed {} ({})", destination, digest);
                    digests.insert(destination.to_string(), digest);
                }
                None => warn!("Pushed {} but no digest was reported", destination),
            }
        }
        Ok(digests)
    }

    async fn push_one(
        &self,
        buildah: &Buildah,
        request: &BuildRequest,
        destination: &str,
    ) -> Result<CommandOutput> {
        let attempts = request.push_retry.unwrap_or(1).max(1);
        let spec = buildah.command(buildah.push_args(request, destination));
        debug!("Running: {}", sanitize_command(&spec));

        let executor = RetryExecutorBuilder::new()
            .with_policy(RetryPolicy::linear(attempts, PUSH_BACKOFF_STEP_MS))
            .with_predicate(ClosurePredicate::new(|failure: &PushFailure| {
                failure.class != FailureClass::Auth
            }))
            .with_observer(TracingObserver::new(format!("push {}", destination)))
            .build();

        let runner = self.runner;
        let spec = &spec;
        let result = executor
            .execute(move || async move {
                let output = runner.run(spec).await.map_err(|e| PushFailure {
                    class: FailureClass::Unknown,
                    message: e.to_string(),
                })?;
                if output.success {
                    Ok(output)
                } else {
                    let message = output.error_message();
                    Err(PushFailure {
                        class: classify_failure(&message),
                        message,
                    })
                }
            })
            .await;

        result.map_err(|err| match err {
            RetryError::NonRetryable { source, .. } => Error::auth(destination, source.message),
            RetryError::Exhausted {
                attempts, source, ..
            } => Error::PushExhausted {
                destination: destination.to_string(),
                attempts,
                message: source.message,
            },
        })
    }

    /// Write the first destination to a local OCI archive
    pub async fn export_archive(
        &self,
        buildah: &Buildah,
        request: &BuildRequest,
        path: &std::path::Path,
    ) -> Result<()> {
        let image = request
            .sorted_destinations()
            .first()
            .copied()
            .ok_or_else(|| Error::invalid_config("no destination to export"))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let spec = buildah.command(buildah.archive_args(request, image, path));
        debug!("Running: {}", sanitize_command(&spec));
        let output = self.runner.run(&spec).await?;
        if !output.success {
            return Err(Error::ExportFailed {
                path: path.display().to_string(),
                message: output.error_message(),
            });
        }
        info!("Exported {} to {}", image, path.display());
        Ok(())
    }
}
