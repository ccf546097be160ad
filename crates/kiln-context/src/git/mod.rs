//! Git context handling
//!
//! - `url` - classification, normalization, token injection and masking
//! - `clone` - shallow checkouts for backends without native git contexts

pub mod clone;
pub mod url;

pub use clone::clone_repository;
pub use url::{
    add_token, apply_fragment, format_native_ref, is_git_url, mask_credentials, mask_token,
    normalize_url, split_fragment,
};
