//! Build command

use crate::cli::BuildArgs;
use crate::output;
use anyhow::{Context, Result};
use kiln_builder::Orchestrator;
use kiln_core::types::BuildRequest;
use kiln_core::{RuntimeConfig, TokioRunner};
use tracing::debug;

pub async fn run(args: BuildArgs) -> Result<()> {
    let json = args.json;
    let request = load_request(args)?;

    let runtime = RuntimeConfig::from_env().context("Failed to resolve runtime environment")?;
    debug!("Runtime: {:?}", runtime);
    let runner = TokioRunner::new();
    let env = |key: &str| std::env::var(key).ok();

    let outcome = Orchestrator::new(&runtime, &runner, &env)
        .build(&request)
        .await
        .context("Build failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        output::build_summary(&request.sorted_destinations(), &outcome);
    }
    Ok(())
}

/// Request file (if any) overlaid with command line flags
fn load_request(mut args: BuildArgs) -> Result<BuildRequest> {
    let base = match args.request.take() {
        Some(path) => BuildRequest::from_yaml_file(path.as_std_path())
            .with_context(|| format!("Failed to load build request {}", path))?,
        None => BuildRequest::default(),
    };
    Ok(args.apply_to(base))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_request_from_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("request.yaml");
        std::fs::write(
            &path,
            "context: /workspace\ndestinations: [ghcr.io/acme/app:1]\npush-retry: 2\n",
        )
        .unwrap();

        let args = BuildArgs {
            request: Some(camino::Utf8PathBuf::from_path_buf(path).unwrap()),
            destinations: vec!["ghcr.io/acme/app:latest".into()],
            ..Default::default()
        };
        let request = load_request(args).unwrap();

        assert_eq!(request.context, "/workspace");
        assert_eq!(
            request.destinations,
            vec!["ghcr.io/acme/app:1", "ghcr.io/acme/app:latest"]
        );
        assert_eq!(request.push_retry, Some(2));
    }

    #[test]
    fn test_missing_request_file() {
        let args = BuildArgs {
            request: Some("/nonexistent/request.yaml".into()),
            ..Default::default()
        };
        let err = load_request(args).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/request.yaml"));
    }
}
