//! Error types for kiln-builder

use thiserror::Error;

/// Result type alias using kiln-builder's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Help appended to authentication failures
pub const AUTH_REMEDIATION: &str = "\
Registry authentication failed. Provide credentials in one of these ways:
  - run `buildah login <registry>` before building
  - mount a docker config secret, e.g. `-v ~/.docker/config.json:/home/build/.docker/config.json:ro`
  - point REGISTRY_AUTH_FILE (or DOCKER_CONFIG) at an existing auth file";

/// Build orchestration error types
#[derive(Error, Debug)]
pub enum Error {
    /// Neither backend is installed
    #[error("No build backend found. Install one of: {}", expected.join(", "))]
    NoBackend { expected: Vec<String> },

    /// Request cannot be turned into a backend invocation
    #[error("Invalid build configuration: {message}")]
    InvalidConfig { message: String },

    /// buildkitd could not be launched
    #[error("Failed to start buildkitd: {message}")]
    DaemonStart { message: String },

    /// buildkitd died before becoming ready
    #[error("buildkitd exited before becoming ready on {socket}")]
    DaemonExited { socket: String },

    /// buildkitd never answered the readiness probe
    #[error("buildkitd not ready on {socket} after {attempts} attempts")]
    DaemonNotReady { socket: String, attempts: u32 },

    /// Illegal daemon state change
    #[error("Invalid daemon transition from {from} on {event}")]
    InvalidTransition { from: String, event: String },

    /// Backend build command failed
    #[error("{backend} build failed: {message}")]
    BuildFailed { backend: String, message: String },

    /// Writing the local archive failed
    #[error("Failed to export image archive to {path}: {message}")]
    ExportFailed { path: String, message: String },

    /// Push rejected for lack of credentials; never retried
    #[error("Push to {destination} failed: {message}\n{AUTH_REMEDIATION}")]
    Auth {
        destination: String,
        message: String,
    },

    /// Push kept failing until the retry bound
    #[error("Push to {destination} failed after {attempts} attempts: {message}")]
    PushExhausted {
        destination: String,
        attempts: u32,
        message: String,
    },

    /// Context resolution error
    #[error(transparent)]
    Context(#[from] kiln_context::Error),

    /// Image, artifact or signing error
    #[error(transparent)]
    Image(#[from] kiln_image::Error),

    /// Core error (validation, process execution)
    #[error(transparent)]
    Core(#[from] kiln_core::Error),

    /// buildkitd config could not be parsed
    #[error("Invalid buildkitd config: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// buildkitd config could not be rendered
    #[error("Failed to render buildkitd config: {0}")]
    TomlRender(#[from] toml::ser::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a no backend error
    pub fn no_backend<I, S>(expected: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::NoBackend {
            expected: expected.into_iter().map(Into::into).collect(),
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a daemon start error
    pub fn daemon_start(message: impl Into<String>) -> Self {
        Self::DaemonStart {
            message: message.into(),
        }
    }

    /// Create a build failed error
    pub fn build_failed(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BuildFailed {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Create an auth error
    pub fn auth(destination: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Auth {
            destination: destination.into(),
            message: message.into(),
        }
    }
}
