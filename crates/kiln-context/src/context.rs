//! Build context preparation and ownership

use crate::env::expand_env;
use crate::error::{Error, Result};
use crate::git::{self, url::apply_fragment};
use kiln_core::types::GitConfig;
use kiln_core::{validation, CommandRunner, RuntimeConfig};
use std::fmt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// How a git context is handed to the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextMode {
    /// Pass a `url#ref:subpath` reference through (buildkit)
    NativeGit,
    /// Clone into a temporary directory (buildah)
    LocalCheckout,
}

/// Where the build context lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextSource {
    /// Directory on disk
    Local(PathBuf),
    /// BuildKit-native git reference
    Git(String),
}

/// A prepared build context
///
/// Owns the temporary checkout, if any. [`BuildContext::release`] removes it
/// and may be called any number of times; dropping the context releases it
/// as well.
#[derive(Debug)]
pub struct BuildContext {
    source: ContextSource,
    temp_dir: Option<TempDir>,
}

impl BuildContext {
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self {
            source: ContextSource::Local(path.into()),
            temp_dir: None,
        }
    }

    pub fn git(reference: impl Into<String>) -> Self {
        Self {
            source: ContextSource::Git(reference.into()),
            temp_dir: None,
        }
    }

    fn checkout(path: PathBuf, temp_dir: TempDir) -> Self {
        Self {
            source: ContextSource::Local(path),
            temp_dir: Some(temp_dir),
        }
    }

    pub fn source(&self) -> &ContextSource {
        &self.source
    }

    pub fn local_path(&self) -> Option<&Path> {
        match &self.source {
            ContextSource::Local(path) => Some(path),
            ContextSource::Git(_) => None,
        }
    }

    pub fn git_ref(&self) -> Option<&str> {
        match &self.source {
            ContextSource::Git(reference) => Some(reference),
            ContextSource::Local(_) => None,
        }
    }

    /// Remove the temporary checkout; later calls do nothing
    pub fn release(&mut self) -> Result<()> {
        if let Some(dir) = self.temp_dir.take() {
            let path = dir.path().to_path_buf();
            dir.close()?;
            debug!("Removed temporary context {}", path.display());
        }
        Ok(())
    }
}

impl Drop for BuildContext {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("Failed to remove temporary build context: {}", e);
        }
    }
}

impl fmt::Display for BuildContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            ContextSource::Local(path) => write!(f, "{}", path.display()),
            ContextSource::Git(reference) => write!(f, "{}", git::mask_credentials(reference)),
        }
    }
}

type EnvLookup<'a> = &'a (dyn Fn(&str) -> Option<String> + Send + Sync);

/// Turns the raw context string of a request into a [`BuildContext`]
pub struct ContextResolver<'a> {
    runtime: &'a RuntimeConfig,
    runner: &'a dyn CommandRunner,
    env: EnvLookup<'a>,
}

impl<'a> ContextResolver<'a> {
    pub fn new(
        runtime: &'a RuntimeConfig,
        runner: &'a dyn CommandRunner,
        env: EnvLookup<'a>,
    ) -> Self {
        Self {
            runtime,
            runner,
            env,
        }
    }

    /// Resolve `raw` into a ready-to-use context
    ///
    /// Environment references are expanded first. Git URLs are normalized
    /// and authenticated, then either passed through as a native reference
    /// or cloned, depending on `mode`. Local paths must exist.
    pub async fn prepare(
        &self,
        raw: &str,
        options: &GitConfig,
        mode: ContextMode,
    ) -> Result<BuildContext> {
        let expanded = expand_env(raw, |name| (self.env)(name));
        let expanded = expanded.trim();
        if expanded.is_empty() {
            return Err(Error::MissingContext);
        }
        validation::validate_string("context", expanded)?;

        if !git::is_git_url(expanded) {
            let path = PathBuf::from(expanded);
            if !path.exists() {
                return Err(Error::context_not_found(expanded));
            }
            debug!("Using local build context {}", path.display());
            return Ok(BuildContext::local(path));
        }

        let (base, fragment) = git::split_fragment(expanded);
        let options = apply_fragment(options, fragment);
        let url = git::normalize_url(base, self.runtime.prefer_ssh);
        let url = self.authenticate(&url, &options).await?;

        match mode {
            ContextMode::NativeGit => {
                let reference = git::format_native_ref(&url, &options);
                info!("Using git build context {}", git::mask_credentials(&reference));
                Ok(BuildContext::git(reference))
            }
            ContextMode::LocalCheckout => self.checkout(&url, &options).await,
        }
    }

    async fn authenticate(&self, url: &str, options: &GitConfig) -> Result<String> {
        let Some(token_file) = &options.token_file else {
            return Ok(url.to_string());
        };
        let token = tokio::fs::read_to_string(token_file)
            .await
            .map_err(|source| Error::TokenFile {
                path: token_file.display().to_string(),
                source,
            })?;
        Ok(git::add_token(url, &token, options.token_user()))
    }

    async fn checkout(&self, url: &str, options: &GitConfig) -> Result<BuildContext> {
        let root = &self.runtime.workspace_root;
        tokio::fs::create_dir_all(root).await?;
        let temp_dir = tempfile::Builder::new()
            .prefix("kiln-context-")
            .tempdir_in(root)?;

        // on error the TempDir drops here and removes the partial checkout
        git::clone_repository(self.runner, url, temp_dir.path(), options).await?;

        let path = match options.subpath() {
            Some(subpath) => {
                validation::validate_path_within("git subpath", temp_dir.path(), subpath)?
            }
            None => temp_dir.path().to_path_buf(),
        };
        if !path.is_dir() {
            return Err(Error::context_not_found(path.display().to_string()));
        }

        Ok(BuildContext::checkout(path, temp_dir))
    }
}
