//! Input validation
//!
//! Everything that ends up on an external command line or in a filesystem
//! path passes through one of these checks first.

use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Longest string accepted for any single request value
pub const MAX_VALUE_LEN: usize = 4096;

/// Unix domain socket paths are limited by `sun_path` (108 bytes incl. NUL)
pub const MAX_SOCKET_PATH_LEN: usize = 107;

/// Reject null bytes and unreasonably long values
pub fn validate_string(field: &str, value: &str) -> Result<()> {
    if value.contains('\0') {
        return Err(Error::validation(field, "contains a null byte"));
    }
    if value.len() > MAX_VALUE_LEN {
        return Err(Error::validation(
            field,
            format!("longer than {} bytes", MAX_VALUE_LEN),
        ));
    }
    Ok(())
}

/// [`validate_string`] for paths
pub fn validate_path(field: &str, path: &Path) -> Result<()> {
    validate_string(field, &path.to_string_lossy())
}

/// Join `relative` onto `root`, refusing anything that would leave `root`
///
/// The check is lexical so it works for paths that do not exist yet.
pub fn validate_path_within(field: &str, root: &Path, relative: &str) -> Result<PathBuf> {
    validate_string(field, relative)?;

    let relative = Path::new(relative);
    if relative.is_absolute() {
        return Err(Error::validation(field, "must be a relative path"));
    }

    let mut depth: usize = 0;
    for component in relative.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    Error::validation(field, "directory traversal (..) escapes the root")
                })?;
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(Error::validation(field, "must be a relative path"));
            }
        }
    }

    Ok(root.join(relative))
}

/// Socket paths must be absolute and fit in `sun_path`
pub fn validate_socket_path(path: &Path) -> Result<()> {
    validate_path("socket path", path)?;
    if !path.is_absolute() {
        return Err(Error::validation("socket path", "must be absolute"));
    }
    let len = path.as_os_str().len();
    if len > MAX_SOCKET_PATH_LEN {
        return Err(Error::validation(
            "socket path",
            format!("{} bytes exceeds the {} byte limit", len, MAX_SOCKET_PATH_LEN),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_string() {
        assert!(validate_string("arg", "plain value").is_ok());
        assert!(validate_string("arg", "").is_ok());
        assert!(validate_string("arg", "a\0b").is_err());
        assert!(validate_string("arg", &"x".repeat(MAX_VALUE_LEN)).is_ok());
        assert!(validate_string("arg", &"x".repeat(MAX_VALUE_LEN + 1)).is_err());
    }

    #[test]
    fn test_validate_path_within() {
        let root = Path::new("/work/repo");

        assert_eq!(
            validate_path_within("subpath", root, "services/api").unwrap(),
            PathBuf::from("/work/repo/services/api")
        );
        assert!(validate_path_within("subpath", root, "a/../b").is_ok());
        assert!(validate_path_within("subpath", root, "./a").is_ok());

        assert!(validate_path_within("subpath", root, "../outside").is_err());
        assert!(validate_path_within("subpath", root, "a/../../b").is_err());
        assert!(validate_path_within("subpath", root, "/etc").is_err());
    }

    #[test]
    fn test_validate_socket_path() {
        assert!(validate_socket_path(Path::new("/run/user/1000/buildkit/buildkitd.sock")).is_ok());
        assert!(validate_socket_path(Path::new("relative.sock")).is_err());

        let long = format!("/{}", "a".repeat(MAX_SOCKET_PATH_LEN));
        assert!(validate_socket_path(Path::new(&long)).is_err());
    }
}
