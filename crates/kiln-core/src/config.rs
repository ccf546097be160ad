//! Runtime configuration
//!
//! Everything Kiln needs from the process environment is read here, once, at
//! the entry point. The resulting [`RuntimeConfig`] is passed by reference to
//! every component instead of components calling `std::env::var` themselves.

use crate::error::{Error, Result};
use std::path::PathBuf;

/// Forces `git@host:owner/repo` contexts to stay on SSH
pub const PREFER_SSH_ENV: &str = "KILN_PREFER_SSH";

/// Root directory for temporary build contexts
pub const WORKSPACE_ENV: &str = "KILN_WORKSPACE";

/// Environment-derived settings shared by all build components
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Home directory (`HOME`, falling back to the passwd entry)
    pub home_dir: PathBuf,
    /// Per-user runtime directory (`XDG_RUNTIME_DIR`)
    pub runtime_dir: PathBuf,
    /// Keep SSH shorthand git URLs instead of rewriting them to HTTPS
    pub prefer_ssh: bool,
    /// Where temporary build contexts are materialized
    pub workspace_root: PathBuf,
    /// Registry credential directory (`DOCKER_CONFIG`, the directory of
    /// `REGISTRY_AUTH_FILE`, or `~/.docker`)
    pub docker_config_dir: PathBuf,
}

impl RuntimeConfig {
    /// Resolve the configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve the configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // HOME wins over the passwd entry so container ALT_HOME setups keep working
        let home_dir = match non_empty(lookup("HOME")) {
            Some(home) => PathBuf::from(home),
            None => dirs::home_dir()
                .ok_or_else(|| Error::invalid_config("Could not determine home directory"))?,
        };

        let runtime_dir = non_empty(lookup("XDG_RUNTIME_DIR"))
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("kiln-runtime"));

        let prefer_ssh = lookup(PREFER_SSH_ENV)
            .map(|value| is_truthy(&value))
            .unwrap_or(false);

        let workspace_root = non_empty(lookup(WORKSPACE_ENV))
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("kiln"));

        let docker_config_dir = non_empty(lookup("DOCKER_CONFIG"))
            .map(PathBuf::from)
            .or_else(|| {
                non_empty(lookup("REGISTRY_AUTH_FILE"))
                    .and_then(|file| PathBuf::from(file).parent().map(PathBuf::from))
                    .filter(|dir| !dir.as_os_str().is_empty())
            })
            .unwrap_or_else(|| home_dir.join(".docker"));

        Ok(Self {
            home_dir,
            runtime_dir,
            prefer_ssh,
            workspace_root,
            docker_config_dir,
        })
    }

    /// Control socket of the rootless buildkitd instance
    pub fn buildkit_socket(&self) -> PathBuf {
        self.runtime_dir.join("buildkit").join("buildkitd.sock")
    }

    /// buildkitd configuration file (insecure registry entries live here)
    pub fn buildkitd_config(&self) -> PathBuf {
        self.home_dir
            .join(".config")
            .join("buildkit")
            .join("buildkitd.toml")
    }
}

/// Resolves the directory the backends read registry credentials from
///
/// Registry login and cloud credential refresh happen outside Kiln; this is
/// the only thing the build core needs to know about them.
pub trait CredentialResolver: Send + Sync {
    /// Directory containing `config.json`, or `None` to use backend defaults
    fn auth_dir(&self, runtime: &RuntimeConfig) -> Option<PathBuf>;
}

/// Uses `DOCKER_CONFIG` / `~/.docker` when it holds a `config.json`
#[derive(Debug, Clone, Copy, Default)]
pub struct DockerConfigResolver;

impl CredentialResolver for DockerConfigResolver {
    fn auth_dir(&self, runtime: &RuntimeConfig) -> Option<PathBuf> {
        let dir = &runtime.docker_config_dir;
        dir.join("config.json").is_file().then(|| dir.clone())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_from_lookup_reads_overrides() {
        let config = RuntimeConfig::from_lookup(lookup_from(&[
            ("HOME", "/home/builder"),
            ("XDG_RUNTIME_DIR", "/run/user/1000"),
            ("KILN_PREFER_SSH", "true"),
            ("KILN_WORKSPACE", "/workspace"),
        ]))
        .unwrap();

        assert_eq!(config.home_dir, PathBuf::from("/home/builder"));
        assert_eq!(config.runtime_dir, PathBuf::from("/run/user/1000"));
        assert!(config.prefer_ssh);
        assert_eq!(config.workspace_root, PathBuf::from("/workspace"));
        assert_eq!(
            config.docker_config_dir,
            PathBuf::from("/home/builder/.docker")
        );
    }

    #[test]
    fn test_registry_auth_file_sets_credential_dir() {
        let config = RuntimeConfig::from_lookup(lookup_from(&[
            ("HOME", "/home/builder"),
            ("REGISTRY_AUTH_FILE", "/kaniko/.docker/config.json"),
        ]))
        .unwrap();
        assert_eq!(config.docker_config_dir, PathBuf::from("/kaniko/.docker"));

        let config = RuntimeConfig::from_lookup(lookup_from(&[
            ("HOME", "/home/builder"),
            ("DOCKER_CONFIG", "/etc/docker-auth"),
            ("REGISTRY_AUTH_FILE", "/kaniko/.docker/config.json"),
        ]))
        .unwrap();
        assert_eq!(config.docker_config_dir, PathBuf::from("/etc/docker-auth"));
    }

    #[test]
    fn test_socket_and_config_paths() {
        let config = RuntimeConfig::from_lookup(lookup_from(&[
            ("HOME", "/home/builder"),
            ("XDG_RUNTIME_DIR", "/run/user/1000"),
        ]))
        .unwrap();

        assert_eq!(
            config.buildkit_socket(),
            PathBuf::from("/run/user/1000/buildkit/buildkitd.sock")
        );
        assert_eq!(
            config.buildkitd_config(),
            PathBuf::from("/home/builder/.config/buildkit/buildkitd.toml")
        );
        assert!(!config.prefer_ssh);
    }

    #[test]
    fn test_prefer_ssh_values() {
        for (value, expected) in [("1", true), ("YES", true), ("0", false), ("", false)] {
            let config = RuntimeConfig::from_lookup(lookup_from(&[
                ("HOME", "/h"),
                ("KILN_PREFER_SSH", value),
            ]))
            .unwrap();
            assert_eq!(config.prefer_ssh, expected, "value {:?}", value);
        }
    }

    #[test]
    fn test_docker_config_resolver_requires_config_json() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RuntimeConfig::from_lookup(lookup_from(&[("HOME", "/h")])).unwrap();
        config.docker_config_dir = dir.path().to_path_buf();

        assert_eq!(DockerConfigResolver.auth_dir(&config), None);

        std::fs::write(dir.path().join("config.json"), "{}").unwrap();
        assert_eq!(
            DockerConfigResolver.auth_dir(&config),
            Some(dir.path().to_path_buf())
        );
    }
}
