//! # kiln-context
//!
//! Build context resolution for Kiln:
//! - Git URL classification, normalization and credential injection
//! - BuildKit-native git references (`url#ref:subpath`)
//! - Shallow clones into temporary directories for backends that need a
//!   local checkout
//! - The [`BuildContext`] handle that owns those directories
//! - Redaction of command lines before they are logged

pub mod context;
pub mod env;
pub mod error;
pub mod git;
pub mod sanitize;

pub use context::{BuildContext, ContextMode, ContextResolver, ContextSource};
pub use error::{Error, Result};
pub use sanitize::{sanitize_args, sanitize_command};
