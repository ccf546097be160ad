//! End-to-end build orchestration
//!
//! One [`Orchestrator::build`] call runs a whole request: backend detection,
//! context preparation, the daemon (buildkit only), the build, pushes,
//! digest files and signing. The context and daemon are released on every
//! path out, including errors.

use crate::backend::select::{on_path, select_backend_with};
use crate::backend::{Backend, BackendKind};
use crate::daemon::{
    ensure_insecure_registries, BuildkitDaemon, READY_MAX_ATTEMPTS, READY_POLL_INTERVAL_MS,
};
use crate::error::{Error, Result};
use crate::push::PushOrchestrator;
use kiln_context::sanitize_command;
use kiln_context::git::mask_credentials;
use kiln_context::{BuildContext, ContextResolver};
use kiln_core::retry::RetryPolicy;
use kiln_core::types::{BuildRequest, OutputMode};
use kiln_core::{CommandRunner, CredentialResolver, DockerConfigResolver, RuntimeConfig};
use kiln_image::{write_artifacts, DigestMap, SigningCoordinator};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Lines of backend output kept in a build failure message
const FAILURE_TAIL_LINES: usize = 20;

/// Environment variable lookup
pub type EnvLookup<'a> = &'a (dyn Fn(&str) -> Option<String> + Send + Sync);

type BinaryProbe<'a> = Box<dyn Fn(&str) -> bool + Send + Sync + 'a>;

/// Result of a successful build
#[derive(Debug, Clone, Serialize)]
pub struct BuildOutcome {
    pub backend: BackendKind,
    /// Whether images were pushed to their destinations
    pub pushed: bool,
    /// OCI archive written instead of pushing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive: Option<PathBuf>,
    /// Digest per pushed destination
    pub digests: DigestMap,
    /// References signed with cosign, digest-pinned where a digest was known
    pub signed: Vec<String>,
}

/// Runs build requests against whichever backend is installed
pub struct Orchestrator<'a> {
    runtime: &'a RuntimeConfig,
    runner: &'a dyn CommandRunner,
    env: EnvLookup<'a>,
    probe: BinaryProbe<'a>,
    credentials: Box<dyn CredentialResolver + 'a>,
    readiness: RetryPolicy,
}

impl<'a> Orchestrator<'a> {
    pub fn new(runtime: &'a RuntimeConfig, runner: &'a dyn CommandRunner, env: EnvLookup<'a>) -> Self {
        Self {
            runtime,
            runner,
            env,
            probe: Box::new(on_path),
            credentials: Box::new(DockerConfigResolver),
            readiness: RetryPolicy::fixed(READY_MAX_ATTEMPTS, READY_POLL_INTERVAL_MS),
        }
    }

    /// Replace the `PATH` lookup used for backend detection
    pub fn with_probe<F>(mut self, probe: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'a,
    {
        self.probe = Box::new(probe);
        self
    }

    pub fn with_credentials<C>(mut self, credentials: C) -> Self
    where
        C: CredentialResolver + 'a,
    {
        self.credentials = Box::new(credentials);
        self
    }

    /// Override how long to wait for buildkitd
    pub fn with_readiness(mut self, policy: RetryPolicy) -> Self {
        self.readiness = policy;
        self
    }

    /// Run `request` to completion
    pub async fn build(&self, request: &BuildRequest) -> Result<BuildOutcome> {
        request.validate()?;

        // resolved once for the whole build
        let password = request
            .sign
            .password_env
            .as_deref()
            .and_then(|var| (self.env)(var));

        let kind = select_backend_with(|binary| (self.probe)(binary))?;
        let backend = Backend::new(kind, self.runtime, self.credentials.auth_dir(self.runtime));

        let resolver = ContextResolver::new(self.runtime, self.runner, self.env);
        let mut context = resolver
            .prepare(&request.context, &request.git, kind.context_mode())
            .await?;
        info!("Build context: {}", context);

        let mut daemon = match &backend {
            Backend::Buildkit(buildkit) => Some(
                BuildkitDaemon::new(self.runner, buildkit.socket())
                    .with_config(self.runtime.buildkitd_config())
                    .with_readiness(self.readiness.clone()),
            ),
            Backend::Buildah(_) => None,
        };

        let result = self
            .run(&backend, request, &context, daemon.as_mut(), password.as_deref())
            .await;

        if let Some(daemon) = daemon.as_mut() {
            if let Err(e) = daemon.stop().await {
                warn!("Failed to stop buildkitd: {}", e);
            }
        }
        if let Err(e) = context.release() {
            warn!("Failed to remove temporary build context: {}", e);
        }

        result
    }

    async fn run(
        &self,
        backend: &Backend,
        request: &BuildRequest,
        context: &BuildContext,
        mut daemon: Option<&mut BuildkitDaemon<'_>>,
        password: Option<&str>,
    ) -> Result<BuildOutcome> {
        if let Some(daemon) = daemon.as_mut() {
            ensure_insecure_registries(
                &self.runtime.buildkitd_config(),
                &request.insecure_registries,
            )?;
            daemon.start().await?;
            daemon.build_started()?;
        }

        if let OutputMode::Archive(path) = request.output_mode() {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
        }

        let spec = backend.build_command(request, context)?;
        info!("Building {} with {}", request.sorted_destinations().join(", "), backend.kind());
        debug!("Running: {}", sanitize_command(&spec));
        let output = self.runner.run(&spec).await?;

        if let Some(daemon) = daemon.as_mut() {
            daemon.build_finished()?;
        }
        if !output.success {
            return Err(Error::build_failed(
                backend.kind().name(),
                failure_tail(&output.error_message()),
            ));
        }

        let mut digests = DigestMap::new();
        let mode = request.output_mode();
        match &mode {
            OutputMode::Push => {
                if let Some(digest) = backend.build_digest(&output) {
                    info!("Pushed image digest {}", digest);
                    for destination in request.sorted_destinations() {
                        digests.insert(destination.to_string(), digest.clone());
                    }
                }
                digests.extend(PushOrchestrator::new(self.runner).push(backend, request).await?);
            }
            OutputMode::Archive(path) => {
                if let Backend::Buildah(buildah) = backend {
                    PushOrchestrator::new(self.runner)
                        .export_archive(buildah, request, path)
                        .await?;
                }
                info!("Image archive written to {}", path.display());
            }
            OutputMode::BuildOnly => {
                info!("Push disabled; image kept in the local store");
            }
        }

        if request.pushes() && !request.artifacts.is_empty() {
            let first = request
                .sorted_destinations()
                .into_iter()
                .find_map(|d| digests.get(d).map(|digest| (d, digest)));
            match first {
                Some((image, digest)) => write_artifacts(&request.artifacts, image, digest)?,
                None => warn!("No image digest was reported; digest files not written"),
            }
        }

        let signing = SigningCoordinator::new(self.runner)
            .sign(request, &digests, password)
            .await?;

        let archive = match mode {
            OutputMode::Archive(path) => Some(path),
            _ => None,
        };
        Ok(BuildOutcome {
            backend: backend.kind(),
            pushed: request.pushes(),
            archive,
            digests,
            signed: signing.signed,
        })
    }
}

/// Last lines of backend output, credentials masked
fn failure_tail(message: &str) -> String {
    let lines: Vec<&str> = message.lines().collect();
    let start = lines.len().saturating_sub(FAILURE_TAIL_LINES);
    mask_credentials(&lines[start..].join("\n"))
}
