//! Error types for kiln-image

use thiserror::Error;

/// Result type alias using kiln-image's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Image handling error types
#[derive(Error, Debug)]
pub enum Error {
    /// Not a `sha256:<64 hex>` digest
    #[error("Invalid image digest: {value}")]
    InvalidDigest { value: String },

    /// cosign is not installed
    #[error("cosign not found in PATH. Install from: https://docs.sigstore.dev/cosign/installation/")]
    CosignNotFound,

    /// cosign exited with an error
    #[error("Failed to sign {reference}: {message}")]
    SignFailed { reference: String, message: String },

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Core error (process execution)
    #[error(transparent)]
    Core(#[from] kiln_core::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an invalid digest error
    pub fn invalid_digest(value: impl Into<String>) -> Self {
        Self::InvalidDigest {
            value: value.into(),
        }
    }

    /// Create a sign failed error
    pub fn sign_failed(reference: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SignFailed {
            reference: reference.into(),
            message: message.into(),
        }
    }
}
