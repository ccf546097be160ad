//! Backend detection

use super::BackendKind;
use crate::error::{Error, Result};
use tracing::{debug, info};

/// Binaries the daemon backend needs; both must be present
pub const BUILDKIT_BINARIES: [&str; 2] = ["buildctl", "buildkitd"];

/// Binary the process backend needs
pub const BUILDAH_BINARY: &str = "buildah";

/// Whether `binary` is found on `PATH`
pub fn on_path(binary: &str) -> bool {
    which::which(binary).is_ok()
}

/// Detect an installed backend by searching `PATH`
pub fn select_backend() -> Result<BackendKind> {
    select_backend_with(on_path)
}

/// Detect a backend with a custom availability probe
///
/// BuildKit is preferred when both backends are installed.
pub fn select_backend_with<F>(probe: F) -> Result<BackendKind>
where
    F: Fn(&str) -> bool,
{
    if BUILDKIT_BINARIES.iter().all(|binary| probe(binary)) {
        info!("Using buildkit backend (buildctl + buildkitd)");
        return Ok(BackendKind::Buildkit);
    }
    debug!("buildkit binaries not all available");

    if probe(BUILDAH_BINARY) {
        info!("Using buildah backend");
        return Ok(BackendKind::Buildah);
    }

    Err(Error::no_backend(
        BUILDKIT_BINARIES.iter().copied().chain([BUILDAH_BINARY]),
    ))
}
