//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use kiln_core::types::{AttestationDeclaration, AttestationMode, BuildRequest};

/// Kiln - reproducible container image builds on buildah or buildkit
#[derive(Parser, Debug)]
#[command(name = "kiln")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show version information
    Version(VersionArgs),

    /// Build an image and push, archive or keep it locally
    Build(Box<BuildArgs>),
}

// Version command
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// Build command
#[derive(Args, Debug, Default)]
pub struct BuildArgs {
    /// Load the request from a YAML file; flags override its values
    #[arg(long, env = "KILN_REQUEST")]
    pub request: Option<Utf8PathBuf>,

    /// Build context: a directory or a git URL (`url#ref:subpath`)
    #[arg(short, long, env = "KILN_CONTEXT")]
    pub context: Option<String>,

    /// Dockerfile path, relative to the context
    #[arg(short = 'f', long)]
    pub dockerfile: Option<Utf8PathBuf>,

    /// Image reference to tag and push (repeatable)
    #[arg(short, long = "destination", value_name = "IMAGE")]
    pub destinations: Vec<String>,

    /// Multi-stage build target
    #[arg(long)]
    pub target: Option<String>,

    /// Build-time variable (repeatable)
    #[arg(long = "build-arg", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub build_args: Vec<(String, String)>,

    /// Image label (repeatable)
    #[arg(long = "label", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub labels: Vec<(String, String)>,

    /// Target platform, e.g. linux/amd64
    #[arg(long)]
    pub platform: Option<String>,

    /// Reuse the layer cache
    #[arg(long)]
    pub cache: bool,

    /// Local cache directory (buildkit)
    #[arg(long)]
    pub cache_dir: Option<Utf8PathBuf>,

    /// Storage driver (buildah)
    #[arg(long, env = "STORAGE_DRIVER")]
    pub storage_driver: Option<String>,

    /// Skip TLS verification for every registry
    #[arg(long)]
    pub insecure: bool,

    /// Registry reached without TLS verification (repeatable)
    #[arg(long = "insecure-registry", value_name = "HOST")]
    pub insecure_registries: Vec<String>,

    /// Produce reproducible output; disables the cache
    #[arg(long)]
    pub reproducible: bool,

    /// Timestamp applied to reproducible output
    #[arg(long, env = "SOURCE_DATE_EPOCH")]
    pub source_date_epoch: Option<u64>,

    /// Attestation level: off, min or max
    #[arg(long)]
    pub attestation_mode: Option<AttestationMode>,

    /// Structured attestation, e.g. type=sbom,generator=image (repeatable)
    #[arg(long = "attestation", value_name = "ATTESTATION")]
    pub attestations: Vec<AttestationDeclaration>,

    /// Backend option passed through verbatim (repeatable)
    #[arg(long = "opt", value_name = "OPT")]
    pub backend_opts: Vec<String>,

    /// Write an OCI archive here instead of pushing
    #[arg(long)]
    pub tar_path: Option<Utf8PathBuf>,

    /// Build without pushing
    #[arg(long)]
    pub no_push: bool,

    /// Push attempts per destination
    #[arg(long)]
    pub push_retry: Option<u32>,

    /// Base image pull retries (buildah)
    #[arg(long)]
    pub pull_retry: Option<u32>,

    #[command(flatten)]
    pub git: GitArgs,

    #[command(flatten)]
    pub sign: SignArgs,

    #[command(flatten)]
    pub artifacts: ArtifactArgs,

    /// Print the build outcome as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Default)]
pub struct GitArgs {
    /// Branch to build
    #[arg(long = "git-branch")]
    pub branch: Option<String>,

    /// Commit to build; wins over the branch
    #[arg(long = "git-revision")]
    pub revision: Option<String>,

    /// Directory inside the repository used as the context
    #[arg(long = "git-subpath")]
    pub subpath: Option<String>,

    /// File holding an HTTPS access token
    #[arg(long = "git-token-file", env = "KILN_GIT_TOKEN_FILE")]
    pub token_file: Option<Utf8PathBuf>,

    /// User name paired with the token (default oauth2)
    #[arg(long = "git-token-user")]
    pub token_user: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct SignArgs {
    /// Sign pushed images with cosign
    #[arg(long = "sign")]
    pub enabled: bool,

    /// Cosign private key
    #[arg(long = "sign-key", env = "KILN_SIGN_KEY")]
    pub key: Option<Utf8PathBuf>,

    /// Environment variable holding the key password
    #[arg(long = "sign-password-env", value_name = "VAR")]
    pub password_env: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct ArtifactArgs {
    /// Write the image digest here
    #[arg(long)]
    pub digest_file: Option<Utf8PathBuf>,

    /// Write `image@digest` here
    #[arg(long)]
    pub image_name_with_digest_file: Option<Utf8PathBuf>,

    /// Write `{"image": .., "digest": ..}` here
    #[arg(long)]
    pub digest_json_file: Option<Utf8PathBuf>,
}

impl BuildArgs {
    /// Overlay the flags that were given onto `request`
    ///
    /// Scalars replace, lists and maps extend, switches only turn on.
    pub fn apply_to(self, mut request: BuildRequest) -> BuildRequest {
        if let Some(context) = self.context {
            request.context = context;
        }
        if let Some(dockerfile) = self.dockerfile {
            request.dockerfile = dockerfile.into();
        }
        request.destinations.extend(self.destinations);
        set(&mut request.target, self.target);
        request.build_args.extend(self.build_args);
        request.labels.extend(self.labels);
        set(&mut request.platform, self.platform);
        request.cache |= self.cache;
        set(&mut request.cache_dir, self.cache_dir.map(Into::into));
        set(&mut request.storage_driver, self.storage_driver);
        request.insecure |= self.insecure;
        request.insecure_registries.extend(self.insecure_registries);
        request.reproducible |= self.reproducible;
        set(&mut request.source_date_epoch, self.source_date_epoch);
        if let Some(mode) = self.attestation_mode {
            request.attestation_mode = mode;
        }
        request.attestations.extend(self.attestations);
        request.backend_opts.extend(self.backend_opts);
        set(&mut request.tar_path, self.tar_path.map(Into::into));
        request.no_push |= self.no_push;
        set(&mut request.push_retry, self.push_retry);
        set(&mut request.pull_retry, self.pull_retry);

        let git = &mut request.git;
        set(&mut git.branch, self.git.branch);
        set(&mut git.revision, self.git.revision);
        set(&mut git.subpath, self.git.subpath);
        set(&mut git.token_file, self.git.token_file.map(Into::into));
        set(&mut git.token_user, self.git.token_user);

        let sign = &mut request.sign;
        sign.enabled |= self.sign.enabled;
        set(&mut sign.key_path, self.sign.key.map(Into::into));
        set(&mut sign.password_env, self.sign.password_env);

        let artifacts = &mut request.artifacts;
        set(&mut artifacts.digest_file, self.artifacts.digest_file.map(Into::into));
        set(
            &mut artifacts.image_name_with_digest_file,
            self.artifacts.image_name_with_digest_file.map(Into::into),
        );
        set(
            &mut artifacts.digest_json_file,
            self.artifacts.digest_json_file.map(Into::into),
        );

        request
    }
}

fn set<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

/// Parse a `KEY=VALUE` pair; the value may itself contain `=`
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, _)) if key.is_empty() => Err(format!("missing key in '{}'", s)),
        Some((key, value)) => Ok((key.to_string(), value.to_string())),
        None => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}
