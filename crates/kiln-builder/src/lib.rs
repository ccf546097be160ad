//! # kiln-builder
//!
//! Turns a [`BuildRequest`](kiln_core::types::BuildRequest) into backend
//! invocations and runs them:
//!
//! - Backend detection (`buildctl` + `buildkitd`, or `buildah`)
//! - Deterministic command construction for both backends
//! - Rootless buildkitd lifecycle with readiness polling
//! - Digest extraction from backend output
//! - Push with retry, artifact files and Cosign signing
//!
//! # Architecture
//!
//! ```text
//! Orchestrator
//! ├── backend::select      which backend is installed
//! ├── Backend              Buildah | Buildkit command builders
//! ├── daemon               buildkitd start / readiness / stop
//! ├── push                 buildah push with retry
//! └── kiln_image           artifacts and signing
//! ```

pub mod attestation;
pub mod backend;
pub mod daemon;
pub mod digest;
pub mod error;
pub mod orchestrator;
pub mod push;

pub use backend::{select_backend, select_backend_with, Backend, BackendKind};
pub use daemon::{BuildkitDaemon, DaemonState};
pub use digest::{BuildahPushDigest, BuildkitBuildDigest, DigestExtractor};
pub use error::{Error, Result};
pub use orchestrator::{BuildOutcome, Orchestrator};
pub use push::{classify_failure, FailureClass, PushOrchestrator};
pub use kiln_context::sanitize::{sanitize_args, sanitize_command};
