//! buildah command construction

use super::{effective_build_args, resolve_dockerfile};
use crate::error::{Error, Result};
use kiln_context::BuildContext;
use kiln_core::types::BuildRequest;
use kiln_core::CommandSpec;
use kiln_image::registry_host;
use std::path::{Path, PathBuf};

pub const PROGRAM: &str = "buildah";

/// Process backend: `buildah bud` followed by `buildah push`
#[derive(Debug, Clone, Default)]
pub struct Buildah {
    auth_dir: Option<PathBuf>,
}

impl Buildah {
    pub fn new(auth_dir: Option<PathBuf>) -> Self {
        Self { auth_dir }
    }

    fn auth_file(&self) -> Option<PathBuf> {
        self.auth_dir.as_ref().map(|dir| dir.join("config.json"))
    }

    /// Wrap arguments into a `buildah` invocation carrying the auth file
    pub fn command(&self, args: Vec<String>) -> CommandSpec {
        let mut spec = CommandSpec::new(PROGRAM).args(args);
        if let Some(auth_file) = self.auth_file() {
            spec = spec.env("REGISTRY_AUTH_FILE", auth_file.to_string_lossy().into_owned());
        }
        spec
    }

    /// `[--storage-driver <d>] bud ... <context>`
    pub fn build_args(&self, request: &BuildRequest, context: &BuildContext) -> Result<Vec<String>> {
        let context_dir = context.local_path().ok_or_else(|| {
            Error::invalid_config("buildah needs a local build context, not a git reference")
        })?;

        let mut args = storage_args(request);
        args.push("bud".into());

        let dockerfile = resolve_dockerfile(context_dir, &request.dockerfile);
        args.push("--file".into());
        args.push(path_arg(&dockerfile));

        for destination in request.sorted_destinations() {
            args.push("--tag".into());
            args.push(destination.to_string());
        }
        if let Some(target) = &request.target {
            args.push("--target".into());
            args.push(target.clone());
        }
        if let Some(platform) = &request.platform {
            args.push("--platform".into());
            args.push(platform.clone());
        }
        for (key, value) in effective_build_args(request) {
            args.push("--build-arg".into());
            args.push(format!("{}={}", key, value));
        }
        for (key, value) in request.sorted_labels() {
            args.push("--label".into());
            args.push(format!("{}={}", key, value));
        }

        if request.cache_enabled() {
            args.push("--layers".into());
        } else {
            args.push("--no-cache".into());
        }
        if request.skip_tls_verify() {
            args.push("--tls-verify=false".into());
        }
        if let Some(retry) = request.pull_retry {
            args.push("--retry".into());
            args.push(retry.to_string());
        }
        if let Some(epoch) = request.reproducible_epoch() {
            args.push("--timestamp".into());
            args.push(epoch.to_string());
        }

        args.push(path_arg(context_dir));
        Ok(args)
    }

    /// `[--storage-driver <d>] push [--tls-verify=false] [--authfile <f>] <image> docker://<image>`
    pub fn push_args(&self, request: &BuildRequest, destination: &str) -> Vec<String> {
        let mut args = storage_args(request);
        args.push("push".into());
        if request.is_insecure_registry(registry_host(destination)) {
            args.push("--tls-verify=false".into());
        }
        if let Some(auth_file) = self.auth_file() {
            args.push("--authfile".into());
            args.push(path_arg(&auth_file));
        }
        args.push(destination.to_string());
        args.push(format!("docker://{}", destination));
        args
    }

    /// `[--storage-driver <d>] push <image> oci-archive:<path>`
    pub fn archive_args(&self, request: &BuildRequest, image: &str, path: &Path) -> Vec<String> {
        let mut args = storage_args(request);
        args.push("push".into());
        args.push(image.to_string());
        args.push(format!("oci-archive:{}", path.display()));
        args
    }
}

/// Global storage option; must precede the subcommand and match between
/// `bud` and `push` or the pushed image is not found
fn storage_args(request: &BuildRequest) -> Vec<String> {
    match &request.storage_driver {
        Some(driver) => vec!["--storage-driver".into(), driver.clone()],
        None => Vec::new(),
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> BuildRequest {
        BuildRequest {
            context: "/src".into(),
            destinations: vec!["ghcr.io/acme/app:1".into()],
            ..Default::default()
        }
    }

    #[test]
    fn test_minimal_bud() {
        let args = Buildah::default()
            .build_args(&request(), &BuildContext::local("/src"))
            .unwrap();
        assert_eq!(
            args.join(" "),
            "bud --file /src/Dockerfile --tag ghcr.io/acme/app:1 --layers /src"
        );
    }

    #[test]
    fn test_full_bud() {
        let mut request = request();
        request.destinations.insert(0, "localhost:5000/app:1".into());
        request.storage_driver = Some("vfs".into());
        request.target = Some("runtime".into());
        request.platform = Some("linux/arm64".into());
        request.build_args.insert("B".into(), "2".into());
        request.build_args.insert("A".into(), "1".into());
        request.labels.insert("org.opencontainers.image.source".into(), "x".into());
        request.insecure_registries = vec!["localhost:5000".into()];
        request.pull_retry = Some(3);
        request.cache = true;
        request.reproducible = true;
        request.source_date_epoch = Some(42);

        let args = Buildah::default()
            .build_args(&request, &BuildContext::local("/src"))
            .unwrap();
        assert_eq!(
            args.join(" "),
            "--storage-driver vfs bud --file /src/Dockerfile \
             --tag ghcr.io/acme/app:1 --tag localhost:5000/app:1 \
             --target runtime --platform linux/arm64 \
             --build-arg A=1 --build-arg B=2 --build-arg SOURCE_DATE_EPOCH=42 \
             --label org.opencontainers.image.source=x \
             --no-cache --tls-verify=false --retry 3 --timestamp 42 /src"
        );
    }

    #[test]
    fn test_git_context_rejected() {
        let err = Buildah::default()
            .build_args(&request(), &BuildContext::git("https://github.com/o/r.git"))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn test_push_args() {
        let mut request = request();
        request.storage_driver = Some("overlay".into());
        request.insecure_registries = vec!["localhost:5000".into()];
        let buildah = Buildah::new(Some(PathBuf::from("/home/build/.docker")));

        assert_eq!(
            buildah.push_args(&request, "localhost:5000/app:1").join(" "),
            "--storage-driver overlay push --tls-verify=false \
             --authfile /home/build/.docker/config.json \
             localhost:5000/app:1 docker://localhost:5000/app:1"
        );
        assert!(!buildah
            .push_args(&request, "ghcr.io/acme/app:1")
            .contains(&"--tls-verify=false".to_string()));
    }

    #[test]
    fn test_archive_args_and_env() {
        let buildah = Buildah::new(Some(PathBuf::from("/auth")));
        assert_eq!(
            buildah
                .archive_args(&request(), "ghcr.io/acme/app:1", Path::new("/out/app.tar"))
                .join(" "),
            "push ghcr.io/acme/app:1 oci-archive:/out/app.tar"
        );

        let spec = buildah.command(vec!["bud".into()]);
        assert_eq!(
            spec.env,
            vec![("REGISTRY_AUTH_FILE".to_string(), "/auth/config.json".to_string())]
        );
    }
}
