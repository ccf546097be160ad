//! buildctl command construction

use super::{effective_build_args, resolve_dockerfile};
use crate::attestation::attestation_opts;
use crate::error::{Error, Result};
use kiln_context::{BuildContext, ContextSource};
use kiln_core::types::{BuildRequest, OutputMode};
use kiln_core::CommandSpec;
use std::path::{Path, PathBuf};

pub const PROGRAM: &str = "buildctl";

const FRONTEND: &str = "dockerfile.v0";

/// Daemon backend: `buildctl build` against a rootless buildkitd
#[derive(Debug, Clone)]
pub struct Buildkit {
    socket: PathBuf,
    auth_dir: Option<PathBuf>,
}

impl Buildkit {
    pub fn new(socket: PathBuf, auth_dir: Option<PathBuf>) -> Self {
        Self { socket, auth_dir }
    }

    pub fn socket(&self) -> &Path {
        &self.socket
    }

    /// `unix://<socket>`
    pub fn address(&self) -> String {
        format!("unix://{}", self.socket.display())
    }

    /// Wrap arguments into a `buildctl` invocation carrying the auth dir
    pub fn command(&self, args: Vec<String>) -> CommandSpec {
        let mut spec = CommandSpec::new(PROGRAM).args(args);
        if let Some(dir) = &self.auth_dir {
            spec = spec.env("DOCKER_CONFIG", dir.to_string_lossy().into_owned());
        }
        spec
    }

    /// `--addr unix://<socket> build --frontend dockerfile.v0 ... --output <spec>`
    pub fn build_args(&self, request: &BuildRequest, context: &BuildContext) -> Result<Vec<String>> {
        let mut args = vec![
            "--addr".to_string(),
            self.address(),
            "build".to_string(),
            "--frontend".to_string(),
            FRONTEND.to_string(),
        ];

        let mut opts = context_opts(request, context, &mut args)?;

        if let Some(target) = &request.target {
            opts.push(format!("target={}", target));
        }
        if let Some(platform) = &request.platform {
            opts.push(format!("platform={}", platform));
        }
        for (key, value) in effective_build_args(request) {
            opts.push(format!("build-arg:{}={}", key, value));
        }
        if let Some(epoch) = request.reproducible_epoch() {
            opts.push(format!("source-date-epoch={}", epoch));
        }
        for (key, value) in request.sorted_labels() {
            opts.push(format!("label:{}={}", key, value));
        }
        opts.extend(attestation_opts(request));
        opts.extend(request.backend_opts.iter().cloned());

        for opt in opts {
            args.push("--opt".into());
            args.push(opt);
        }

        if !request.cache_enabled() {
            args.push("--no-cache".into());
        } else if let Some(dir) = &request.cache_dir {
            args.push("--export-cache".into());
            args.push(format!("type=local,dest={},mode=max", dir.display()));
            args.push("--import-cache".into());
            args.push(format!("type=local,src={}", dir.display()));
        }

        args.push("--output".into());
        args.push(output_spec(request));
        Ok(args)
    }
}

/// Adds `--local` arguments for a directory context and returns the leading
/// `--opt` values for either form
fn context_opts(
    request: &BuildRequest,
    context: &BuildContext,
    args: &mut Vec<String>,
) -> Result<Vec<String>> {
    match context.source() {
        ContextSource::Local(dir) => {
            let dockerfile = resolve_dockerfile(dir, &request.dockerfile);
            let file_name = dockerfile.file_name().ok_or_else(|| {
                Error::invalid_config(format!(
                    "Dockerfile path {} has no file name",
                    request.dockerfile.display()
                ))
            })?;
            let dockerfile_dir = dockerfile.parent().unwrap_or(dir);

            args.push("--local".into());
            args.push(format!("context={}", dir.display()));
            args.push("--local".into());
            args.push(format!("dockerfile={}", dockerfile_dir.display()));
            Ok(vec![format!("filename={}", file_name.to_string_lossy())])
        }
        ContextSource::Git(reference) => Ok(vec![
            format!("context={}", reference),
            format!("filename={}", request.dockerfile.display()),
        ]),
    }
}

/// Value of `--output` for the request's output mode
pub fn output_spec(request: &BuildRequest) -> String {
    let names = request.sorted_destinations().join(",");
    let name = if names.contains(',') {
        format!("\"name={}\"", names)
    } else {
        format!("name={}", names)
    };

    let mut fields = match request.output_mode() {
        OutputMode::Archive(path) => vec![
            "type=oci".to_string(),
            format!("dest={}", path.display()),
            name,
        ],
        OutputMode::Push => vec!["type=image".to_string(), name, "push=true".to_string()],
        OutputMode::BuildOnly => vec!["type=image".to_string(), name, "push=false".to_string()],
    };

    if request.pushes() && request.skip_tls_verify() {
        fields.push("registry.insecure=true".into());
    }
    if request.reproducible {
        fields.push("rewrite-timestamp=true".into());
    }
    fields.join(",")
}
