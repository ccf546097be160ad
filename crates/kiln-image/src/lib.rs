//! Image handling for Kiln
//!
//! This crate provides functionality for:
//! - Registry hosts of image references and pinning them to a digest
//! - The validated [`Digest`] type and the per-destination [`DigestMap`]
//! - Writing digest artifact files after a push
//! - Signing pushed images with Cosign
//!
//! # Example
//!
//! ```
//! use kiln_image::{pin_to_digest, Digest};
//!
//! let digest = Digest::parse(&format!("sha256:{}", "a".repeat(64))).unwrap();
//! let pinned = pin_to_digest("localhost:5000/app:1.0", &digest);
//! assert_eq!(pinned, format!("localhost:5000/app@{}", digest));
//! ```

pub mod artifacts;
pub mod digest;
pub mod error;
pub mod reference;
pub mod sign;

pub use artifacts::{write_artifacts, DigestRecord};
pub use digest::{Digest, DigestMap};
pub use error::{Error, Result};
pub use reference::{pin_to_digest, registry_host};
pub use sign::{SignOutcome, SigningCoordinator};
