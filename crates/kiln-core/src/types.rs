//! Build request model
//!
//! A [`BuildRequest`] is the single source of truth for one build. It is
//! immutable for the duration of a build attempt; the accessors here encode
//! the ordering and reproducibility rules every backend must follow.

use crate::error::{Error, Result};
use crate::validation;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// User injected into token-authenticated git URLs when none is configured
pub const DEFAULT_TOKEN_USER: &str = "oauth2";

/// Build-time variable carrying the reproducibility epoch
pub const SOURCE_DATE_EPOCH: &str = "SOURCE_DATE_EPOCH";

/// Declarative description of a single image build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BuildRequest {
    /// Local path or git URL of the build context
    pub context: String,
    /// Dockerfile path, relative to the context unless absolute
    pub dockerfile: PathBuf,
    /// Image references to tag and push
    pub destinations: Vec<String>,
    /// Multi-stage target
    pub target: Option<String>,
    /// Build-time variables
    pub build_args: HashMap<String, String>,
    /// Image labels
    pub labels: HashMap<String, String>,
    /// Target platform (e.g. `linux/amd64`)
    pub platform: Option<String>,
    /// Reuse layer cache
    pub cache: bool,
    /// Local cache directory (buildkit only)
    pub cache_dir: Option<PathBuf>,
    /// Storage driver hint (buildah only)
    pub storage_driver: Option<String>,
    /// Disable TLS verification for every registry
    pub insecure: bool,
    /// Registries that are reached without TLS verification
    pub insecure_registries: Vec<String>,
    /// Produce byte-for-byte reproducible output
    pub reproducible: bool,
    /// Timestamp used for every output artifact when reproducible
    pub source_date_epoch: Option<u64>,
    /// Simple attestation level
    pub attestation_mode: AttestationMode,
    /// Structured attestations; override `attestation_mode` when present
    pub attestations: Vec<AttestationDeclaration>,
    /// Backend options passed through verbatim
    pub backend_opts: Vec<String>,
    /// Write the image to a local OCI archive instead of pushing
    pub tar_path: Option<PathBuf>,
    /// Build and tag without pushing
    pub no_push: bool,
    /// Push attempts per destination (1 = no retry)
    pub push_retry: Option<u32>,
    /// Base image pull retries (buildah only)
    pub pull_retry: Option<u32>,
    /// Git context options
    pub git: GitConfig,
    /// Signing options
    pub sign: SigningConfig,
    /// Digest files written after a successful push
    pub artifacts: ArtifactPaths,
}

impl Default for BuildRequest {
    fn default() -> Self {
        Self {
            context: String::new(),
            dockerfile: PathBuf::from("Dockerfile"),
            destinations: Vec::new(),
            target: None,
            build_args: HashMap::new(),
            labels: HashMap::new(),
            platform: None,
            cache: false,
            cache_dir: None,
            storage_driver: None,
            insecure: false,
            insecure_registries: Vec::new(),
            reproducible: false,
            source_date_epoch: None,
            attestation_mode: AttestationMode::Off,
            attestations: Vec::new(),
            backend_opts: Vec::new(),
            tar_path: None,
            no_push: false,
            push_retry: None,
            pull_retry: None,
            git: GitConfig::default(),
            sign: SigningConfig::default(),
            artifacts: ArtifactPaths::default(),
        }
    }
}

impl BuildRequest {
    /// Load a request from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::request_not_found(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let request: Self = serde_yaml_ng::from_str(&content)?;
        Ok(request)
    }

    /// Output mode selected by the request (archive wins over build-only)
    pub fn output_mode(&self) -> OutputMode {
        match (&self.tar_path, self.no_push) {
            (Some(path), _) => OutputMode::Archive(path.clone()),
            (None, true) => OutputMode::BuildOnly,
            (None, false) => OutputMode::Push,
        }
    }

    /// Whether images leave the machine as part of this build
    pub fn pushes(&self) -> bool {
        matches!(self.output_mode(), OutputMode::Push)
    }

    /// Cache use after applying the reproducibility override
    pub fn cache_enabled(&self) -> bool {
        self.cache && !self.reproducible
    }

    /// Epoch to stamp on outputs, present only for reproducible builds
    pub fn reproducible_epoch(&self) -> Option<u64> {
        self.reproducible
            .then(|| self.source_date_epoch.unwrap_or(0))
    }

    /// Build args in lexicographic key order
    pub fn sorted_build_args(&self) -> Vec<(&str, &str)> {
        sorted_pairs(&self.build_args)
    }

    /// Labels in lexicographic key order
    pub fn sorted_labels(&self) -> Vec<(&str, &str)> {
        sorted_pairs(&self.labels)
    }

    /// Destinations in lexicographic order without duplicates
    pub fn sorted_destinations(&self) -> Vec<&str> {
        let mut destinations: Vec<&str> = self.destinations.iter().map(String::as_str).collect();
        destinations.sort_unstable();
        destinations.dedup();
        destinations
    }

    /// TLS verification is skipped globally or because some registry is insecure
    pub fn skip_tls_verify(&self) -> bool {
        self.insecure || !self.insecure_registries.is_empty()
    }

    /// Whether `registry` is reached without TLS verification
    pub fn is_insecure_registry(&self, registry: &str) -> bool {
        self.insecure || self.insecure_registries.iter().any(|r| r == registry)
    }

    /// Structural validation of every user-supplied value
    pub fn validate(&self) -> Result<()> {
        if self.context.trim().is_empty() {
            return Err(Error::missing_field("context"));
        }
        if self.destinations.is_empty() {
            return Err(Error::missing_field("destination"));
        }

        validation::validate_string("context", &self.context)?;
        validation::validate_path("dockerfile", &self.dockerfile)?;
        for destination in &self.destinations {
            validation::validate_string("destination", destination)?;
        }
        for (key, value) in self.build_args.iter().chain(self.labels.iter()) {
            if key.is_empty() {
                return Err(Error::validation("build argument", "empty key"));
            }
            validation::validate_string("build argument", key)?;
            validation::validate_string("build argument", value)?;
        }
        for registry in &self.insecure_registries {
            validation::validate_string("insecure registry", registry)?;
        }
        for opt in &self.backend_opts {
            validation::validate_string("backend option", opt)?;
        }
        for value in [&self.target, &self.platform, &self.storage_driver]
            .into_iter()
            .flatten()
        {
            validation::validate_string("option", value)?;
        }

        Ok(())
    }
}

fn sorted_pairs(map: &HashMap<String, String>) -> Vec<(&str, &str)> {
    let mut pairs: Vec<(&str, &str)> = map.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    pairs.sort_unstable();
    pairs
}

/// Where the built image ends up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    /// Local OCI archive at the given path
    Archive(PathBuf),
    /// Pushed to every destination
    Push,
    /// Built and tagged locally only
    BuildOnly,
}

/// Simple attestation level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AttestationMode {
    /// No attestations
    #[default]
    Off,
    /// Minimal provenance, SBOM explicitly disabled
    Min,
    /// SBOM plus maximal provenance
    Max,
}

impl FromStr for AttestationMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "" => Ok(Self::Off),
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            other => Err(Error::invalid_config(format!(
                "unknown attestation mode '{}' (expected off, min or max)",
                other
            ))),
        }
    }
}

impl fmt::Display for AttestationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => write!(f, "off"),
            Self::Min => write!(f, "min"),
            Self::Max => write!(f, "max"),
        }
    }
}

/// Kind of a structured attestation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttestationKind {
    Sbom,
    Provenance,
}

impl FromStr for AttestationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "sbom" => Ok(Self::Sbom),
            "provenance" => Ok(Self::Provenance),
            other => Err(Error::invalid_config(format!(
                "unknown attestation type '{}' (expected sbom or provenance)",
                other
            ))),
        }
    }
}

/// A structured attestation such as `type=sbom,generator=image`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationDeclaration {
    #[serde(rename = "type")]
    pub kind: AttestationKind,
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl AttestationDeclaration {
    pub fn new(kind: AttestationKind) -> Self {
        Self {
            kind,
            params: HashMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

impl FromStr for AttestationDeclaration {
    type Err = Error;

    /// Parse the comma-separated `key=value` form used on the command line
    fn from_str(s: &str) -> Result<Self> {
        let mut kind = None;
        let mut params = HashMap::new();

        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = part.split_once('=').ok_or_else(|| {
                Error::invalid_config(format!("attestation parameter '{}' is not key=value", part))
            })?;
            if key == "type" {
                kind = Some(value.parse::<AttestationKind>()?);
            } else {
                params.insert(key.to_string(), value.to_string());
            }
        }

        let kind = kind.ok_or_else(|| {
            Error::invalid_config(format!("attestation '{}' is missing type=", s))
        })?;

        Ok(Self { kind, params })
    }
}

/// Git context options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct GitConfig {
    pub branch: Option<String>,
    /// Commit to build; wins over `branch`
    pub revision: Option<String>,
    /// Directory inside the repository used as the context root
    pub subpath: Option<String>,
    /// File holding an access token for HTTPS remotes
    pub token_file: Option<PathBuf>,
    pub token_user: Option<String>,
}

impl GitConfig {
    /// Revision if set, otherwise branch
    pub fn effective_ref(&self) -> Option<&str> {
        non_empty(self.revision.as_deref()).or_else(|| non_empty(self.branch.as_deref()))
    }

    pub fn subpath(&self) -> Option<&str> {
        non_empty(self.subpath.as_deref())
    }

    /// Token user, defaulting to `oauth2`
    pub fn token_user(&self) -> &str {
        non_empty(self.token_user.as_deref()).unwrap_or(DEFAULT_TOKEN_USER)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Image signing options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SigningConfig {
    pub enabled: bool,
    pub key_path: Option<PathBuf>,
    /// Name of the environment variable holding the key password
    pub password_env: Option<String>,
}

/// Files describing the pushed image
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ArtifactPaths {
    /// Bare digest
    pub digest_file: Option<PathBuf>,
    /// `image@digest`
    pub image_name_with_digest_file: Option<PathBuf>,
    /// `{"image": ..., "digest": ...}`
    pub digest_json_file: Option<PathBuf>,
}

impl ArtifactPaths {
    pub fn is_empty(&self) -> bool {
        self.digest_file.is_none()
            && self.image_name_with_digest_file.is_none()
            && self.digest_json_file.is_none()
    }
}
