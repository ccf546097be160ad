//! Image signing with Cosign

use crate::digest::DigestMap;
use crate::error::{Error, Result};
use crate::reference::{pin_to_digest, registry_host};
use kiln_core::types::BuildRequest;
use kiln_context::sanitize_command;
use kiln_core::{CommandRunner, CommandSpec};
use std::path::Path;
use tracing::{debug, info, warn};

/// Environment variable cosign reads the key password from
pub const COSIGN_PASSWORD_ENV: &str = "COSIGN_PASSWORD";

/// What the signing step did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignOutcome {
    /// References that were signed, digest-pinned where a digest was known
    pub signed: Vec<String>,
    /// Destinations signed by tag because no digest was recorded for them
    pub missing_digest: Vec<String>,
}

/// Signs pushed images by digest
pub struct SigningCoordinator<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> SigningCoordinator<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    /// `cosign sign --key <key> [--allow-insecure-registry] --yes <reference>`
    pub fn sign_command(
        reference: &str,
        key: &Path,
        insecure: bool,
        password: Option<&str>,
    ) -> CommandSpec {
        let mut spec = CommandSpec::new("cosign")
            .args(["sign", "--key"])
            .arg(key.to_string_lossy().into_owned());
        if insecure {
            spec = spec.arg("--allow-insecure-registry");
        }
        spec = spec.arg("--yes").arg(reference);
        if let Some(password) = password {
            spec = spec.env(COSIGN_PASSWORD_ENV, password);
        }
        spec
    }

    /// Sign every pushed destination, by digest when one was recorded
    ///
    /// Does nothing unless signing is enabled and the build pushed. A missing
    /// key or password is reported as a warning, not an error.
    pub async fn sign(
        &self,
        request: &BuildRequest,
        digests: &DigestMap,
        password: Option<&str>,
    ) -> Result<SignOutcome> {
        let mut outcome = SignOutcome::default();
        let config = &request.sign;

        if !config.enabled {
            return Ok(outcome);
        }
        if !request.pushes() {
            info!("Skipping image signing: nothing was pushed");
            return Ok(outcome);
        }

        let Some(key) = config.key_path.as_deref().filter(|k| k.exists()) else {
            warn!(
                "Image signing requested but the cosign key {} is missing; images are unsigned",
                config
                    .key_path
                    .as_deref()
                    .map(|k| k.display().to_string())
                    .unwrap_or_else(|| "(not configured)".to_string())
            );
            return Ok(outcome);
        };

        if password.is_none() {
            if let Some(var) = &config.password_env {
                warn!(
                    "Signing password variable {} is not set; cosign will run without a password",
                    var
                );
            }
        }

        for destination in request.sorted_destinations() {
            let reference = match digests.get(destination) {
                Some(digest) => pin_to_digest(destination, digest),
                None => {
                    warn!("No digest recorded for {}; signing the tag instead", destination);
                    outcome.missing_digest.push(destination.to_string());
                    destination.to_string()
                }
            };
            if outcome.signed.contains(&reference) {
                continue;
            }

            let insecure = request.is_insecure_registry(registry_host(destination));
            let spec = Self::sign_command(&reference, key, insecure, password);
            debug!("Running: {}", sanitize_command(&spec));

            let output = self.runner.run(&spec).await.map_err(|e| match e {
                kiln_core::Error::Spawn { .. } => Error::CosignNotFound,
                other => Error::Core(other),
            })?;
            if !output.success {
                return Err(Error::sign_failed(&reference, output.error_message()));
            }

            info!("Signed {}", reference);
            outcome.signed.push(reference);
        }

        Ok(outcome)
    }
}
