//! Request, runtime and output fixtures

use kiln_core::types::BuildRequest;
use kiln_core::{CommandOutput, CredentialResolver, RuntimeConfig};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A digest made of one repeated hex character
pub fn digest_of(c: char) -> String {
    format!("sha256:{}", c.to_string().repeat(64))
}

/// Runtime rooted in a temporary directory
pub struct TestEnv {
    pub dir: TempDir,
    pub runtime: RuntimeConfig,
}

impl TestEnv {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().to_path_buf();
        let runtime = RuntimeConfig::from_lookup(|key| match key {
            "HOME" => Some(root.join("home").display().to_string()),
            "XDG_RUNTIME_DIR" => Some(root.join("run").display().to_string()),
            "KILN_WORKSPACE" => Some(root.join("workspace").display().to_string()),
            _ => None,
        })
        .expect("runtime config");
        Self { dir, runtime }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// A local context directory containing a Dockerfile
    pub fn context_dir(&self) -> PathBuf {
        let context = self.path().join("src");
        std::fs::create_dir_all(&context).expect("context dir");
        std::fs::write(context.join("Dockerfile"), "FROM scratch\n").expect("Dockerfile");
        context
    }

    /// Number of leftover temporary checkouts
    pub fn checkouts(&self) -> usize {
        std::fs::read_dir(&self.runtime.workspace_root)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

/// Request building `context` into the given destinations
pub fn request_for(context: &Path, destinations: &[&str]) -> BuildRequest {
    BuildRequest {
        context: context.display().to_string(),
        destinations: destinations.iter().map(|d| d.to_string()).collect(),
        ..Default::default()
    }
}

/// buildah push output reporting `digest`
pub fn buildah_push_output(digest: &str) -> CommandOutput {
    CommandOutput::success("").with_stderr(format!(
        "Getting image source signatures\nCopying blob sha256:{}\nCopying config {}\nWriting manifest to image destination\n",
        "0".repeat(64),
        digest
    ))
}

/// buildctl output for a pushed multi-platform image
pub fn buildkit_push_output(digest: &str) -> CommandOutput {
    CommandOutput::success("").with_stderr(format!(
        "#12 exporting to image\n#12 exporting manifest sha256:{}\n#12 exporting manifest list {} done\n#12 pushing layers done\n",
        "9".repeat(64),
        digest
    ))
}

/// Credentials that are never present
pub struct NoCredentials;

impl CredentialResolver for NoCredentials {
    fn auth_dir(&self, _runtime: &RuntimeConfig) -> Option<PathBuf> {
        None
    }
}

/// Environment lookup over fixed pairs
pub fn env_from(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> + Send + Sync {
    move |key| {
        pairs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.to_string())
    }
}

/// Probe reporting only `installed` as present
pub fn installed(installed: &'static [&'static str]) -> impl Fn(&str) -> bool + Send + Sync {
    move |binary| installed.contains(&binary)
}
