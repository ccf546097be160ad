//! Build backends
//!
//! The two supported backends form a closed set. Everything that differs
//! between them is decided by matching on [`Backend`] once, after selection.

pub mod buildah;
pub mod buildkit;
pub mod select;

pub use buildah::Buildah;
pub use buildkit::Buildkit;
pub use select::{select_backend, select_backend_with};

use crate::digest::{BuildkitBuildDigest, DigestExtractor};
use crate::error::Result;
use kiln_context::{BuildContext, ContextMode};
use kiln_core::types::BuildRequest;
use kiln_core::{CommandOutput, CommandSpec, RuntimeConfig};
use kiln_image::Digest;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Which backend a build runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// `buildah bud`, one process per build
    Buildah,
    /// `buildctl` against a rootless `buildkitd`
    Buildkit,
}

impl BackendKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Buildah => "buildah",
            Self::Buildkit => "buildkit",
        }
    }

    /// How a git context has to be handed to this backend
    pub fn context_mode(&self) -> ContextMode {
        match self {
            Self::Buildah => ContextMode::LocalCheckout,
            Self::Buildkit => ContextMode::NativeGit,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A configured backend
#[derive(Debug, Clone)]
pub enum Backend {
    Buildah(Buildah),
    Buildkit(Buildkit),
}

impl Backend {
    /// Configure `kind` for this machine
    ///
    /// `auth_dir` is the directory holding the registry `config.json`, if any.
    pub fn new(kind: BackendKind, runtime: &RuntimeConfig, auth_dir: Option<PathBuf>) -> Self {
        match kind {
            BackendKind::Buildah => Self::Buildah(Buildah::new(auth_dir)),
            BackendKind::Buildkit => {
                Self::Buildkit(Buildkit::new(runtime.buildkit_socket(), auth_dir))
            }
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Buildah(_) => BackendKind::Buildah,
            Self::Buildkit(_) => BackendKind::Buildkit,
        }
    }

    /// Arguments of the build invocation, without the program name
    pub fn build_args(&self, request: &BuildRequest, context: &BuildContext) -> Result<Vec<String>> {
        match self {
            Self::Buildah(buildah) => buildah.build_args(request, context),
            Self::Buildkit(buildkit) => buildkit.build_args(request, context),
        }
    }

    /// The complete build invocation
    pub fn build_command(&self, request: &BuildRequest, context: &BuildContext) -> Result<CommandSpec> {
        let args = self.build_args(request, context)?;
        let spec = match self {
            Self::Buildah(buildah) => buildah.command(args),
            Self::Buildkit(buildkit) => buildkit.command(args),
        };
        Ok(spec)
    }

    /// Digest reported by the build command itself
    ///
    /// Only buildkit reports one; buildah's digest comes from the push.
    pub fn build_digest(&self, output: &CommandOutput) -> Option<Digest> {
        match self {
            Self::Buildah(_) => None,
            Self::Buildkit(_) => BuildkitBuildDigest.extract(output),
        }
    }
}

/// Resolve the Dockerfile against a local context directory
pub(crate) fn resolve_dockerfile(context_dir: &Path, dockerfile: &Path) -> PathBuf {
    if dockerfile.is_absolute() {
        dockerfile.to_path_buf()
    } else {
        context_dir.join(dockerfile)
    }
}

/// Build args in sorted order, with the reproducibility epoch last
///
/// A user-supplied `SOURCE_DATE_EPOCH` is replaced by the request's epoch
/// when the build is reproducible.
pub(crate) fn effective_build_args(request: &BuildRequest) -> Vec<(String, String)> {
    let epoch = request.reproducible_epoch();
    let mut args: Vec<(String, String)> = request
        .sorted_build_args()
        .into_iter()
        .filter(|(key, _)| epoch.is_none() || *key != kiln_core::types::SOURCE_DATE_EPOCH)
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    if let Some(epoch) = epoch {
        args.push((
            kiln_core::types::SOURCE_DATE_EPOCH.to_string(),
            epoch.to_string(),
        ));
    }
    args
}
