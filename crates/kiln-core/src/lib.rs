//! # kiln-core
//!
//! Core library for the Kiln build CLI providing:
//! - The `BuildRequest` model and its ordering/reproducibility rules
//! - Runtime configuration resolved once from the environment
//! - External process execution behind the `CommandRunner` trait
//! - Input validation for strings, paths and sockets
//! - Retry execution engine with policy-based configuration

pub mod config;
pub mod error;
pub mod process;
pub mod retry;
pub mod types;
pub mod validation;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::{CredentialResolver, DockerConfigResolver, RuntimeConfig};
pub use error::{Error, Result};
pub use process::{ChildHandle, CommandOutput, CommandRunner, CommandSpec, TokioRunner};
pub use types::{
    ArtifactPaths, AttestationDeclaration, AttestationKind, AttestationMode, BuildRequest,
    GitConfig, OutputMode, SigningConfig,
};
