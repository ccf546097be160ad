//! Error types for kiln-context

use thiserror::Error;

/// Result type alias using kiln-context's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Context resolution error types
#[derive(Error, Debug)]
pub enum Error {
    /// No context was given
    #[error("No build context specified")]
    MissingContext,

    /// Local context does not exist
    #[error("Build context not found: {path}")]
    ContextNotFound { path: String },

    /// Token file could not be read
    #[error("Failed to read git token file {path}: {source}")]
    TokenFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Clone failed (URL credentials masked)
    #[error("Failed to clone repository: {message}")]
    CloneFailed { message: String },

    /// Branch or revision checkout failed
    #[error("Failed to check out '{reference}': {message}")]
    CheckoutFailed { reference: String, message: String },

    /// Core error (validation, process spawning)
    #[error(transparent)]
    Core(#[from] kiln_core::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a context not found error
    pub fn context_not_found(path: impl Into<String>) -> Self {
        Self::ContextNotFound { path: path.into() }
    }

    /// Create a clone failed error
    pub fn clone_failed(message: impl Into<String>) -> Self {
        Self::CloneFailed {
            message: message.into(),
        }
    }

    /// Create a checkout failed error
    pub fn checkout_failed(reference: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CheckoutFailed {
            reference: reference.into(),
            message: message.into(),
        }
    }
}
