//! Version command

use crate::cli::VersionArgs;
use anyhow::Result;
use kiln_builder::select_backend;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct VersionReport {
    version: &'static str,
    /// Build commit, when stamped by CI
    commit: Option<&'static str>,
    /// Backend a build would use on this machine
    backend: Option<&'static str>,
}

impl VersionReport {
    fn collect() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            commit: option_env!("GIT_SHA"),
            backend: select_backend().ok().map(|kind| kind.name()),
        }
    }
}

pub fn run(args: VersionArgs) -> Result<()> {
    let report = VersionReport::collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    match report.commit {
        Some(commit) => println!("kiln {} ({})", report.version, commit),
        None => println!("kiln {}", report.version),
    }
    println!("backend: {}", report.backend.unwrap_or("none found"));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_serializes_version() {
        let json = serde_json::to_value(VersionReport::collect()).unwrap();
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
        assert!(json.get("backend").is_some());
    }
}
