//! Common test utilities for kiln-builder
//!
//! Provides shared test infrastructure:
//! - Request and runtime fixtures
//! - Canned backend output
//! - Command line assertions

#![allow(dead_code)]

pub mod assertions;
pub mod fixtures;

pub use assertions::*;
pub use fixtures::*;
