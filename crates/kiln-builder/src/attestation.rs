//! BuildKit attestation options
//!
//! Produces the values passed to `buildctl build --opt`. Structured
//! declarations replace the simple mode entirely when any are present.

use kiln_core::types::{AttestationDeclaration, AttestationKind, AttestationMode, BuildRequest};
use std::collections::HashMap;

const SBOM_SCAN_CONTEXT: &str = "scan-context";
const SBOM_SCAN_STAGE: &str = "scan-stage";

/// Provenance parameters emitted right after `mode`, in this order
const PROVENANCE_KNOWN: [&str; 5] = [
    "builder-id",
    "reproducible",
    "inline-only",
    "version",
    "filename",
];

/// `--opt` values for the attestations requested by `request`
pub fn attestation_opts(request: &BuildRequest) -> Vec<String> {
    if request.attestations.is_empty() {
        mode_opts(request.attestation_mode)
    } else {
        request
            .attestations
            .iter()
            .flat_map(declaration_opts)
            .collect()
    }
}

/// Options for the simple `off|min|max` switch
pub fn mode_opts(mode: AttestationMode) -> Vec<String> {
    match mode {
        AttestationMode::Off => Vec::new(),
        AttestationMode::Min => vec![
            "attest:provenance=mode=min".to_string(),
            "attest:sbom=false".to_string(),
        ],
        AttestationMode::Max => vec![
            "attest:sbom=".to_string(),
            "attest:provenance=mode=max".to_string(),
        ],
    }
}

/// Options for one structured declaration
pub fn declaration_opts(declaration: &AttestationDeclaration) -> Vec<String> {
    match declaration.kind {
        AttestationKind::Sbom => sbom_opts(&declaration.params),
        AttestationKind::Provenance => vec![provenance_opt(&declaration.params)],
    }
}

fn sbom_opts(params: &HashMap<String, String>) -> Vec<String> {
    let mut fields = Vec::new();
    if let Some(generator) = params.get("generator") {
        fields.push(format!("generator={}", generator));
    }
    for (key, value) in sorted_rest(params, &["generator", SBOM_SCAN_CONTEXT, SBOM_SCAN_STAGE]) {
        fields.push(format!("{}={}", key, value));
    }

    let mut opts = vec![format!("attest:sbom={}", fields.join(","))];
    if let Some(value) = params.get(SBOM_SCAN_CONTEXT) {
        opts.push(format!("build-arg:BUILDKIT_SBOM_SCAN_CONTEXT={}", value));
    }
    if let Some(value) = params.get(SBOM_SCAN_STAGE) {
        opts.push(format!("build-arg:BUILDKIT_SBOM_SCAN_STAGE={}", value));
    }
    opts
}

fn provenance_opt(params: &HashMap<String, String>) -> String {
    let mode = params.get("mode").map(String::as_str).unwrap_or("max");
    let mut fields = vec![format!("mode={}", mode)];

    for key in PROVENANCE_KNOWN {
        if let Some(value) = params.get(key) {
            fields.push(format!("{}={}", key, value));
        }
    }

    let mut handled = vec!["mode"];
    handled.extend(PROVENANCE_KNOWN);
    for (key, value) in sorted_rest(params, &handled) {
        fields.push(format!("{}={}", key, value));
    }

    format!("attest:provenance={}", fields.join(","))
}

fn sorted_rest<'a>(params: &'a HashMap<String, String>, skip: &[&str]) -> Vec<(&'a str, &'a str)> {
    let mut rest: Vec<(&str, &str)> = params
        .iter()
        .filter(|(k, _)| !skip.contains(&k.as_str()))
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    rest.sort_unstable();
    rest
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(mode: AttestationMode, attestations: Vec<AttestationDeclaration>) -> BuildRequest {
        BuildRequest {
            attestation_mode: mode,
            attestations,
            ..Default::default()
        }
    }

    #[test]
    fn test_simple_modes() {
        assert!(attestation_opts(&request(AttestationMode::Off, vec![])).is_empty());
        assert_eq!(
            attestation_opts(&request(AttestationMode::Min, vec![])),
            vec!["attest:provenance=mode=min", "attest:sbom=false"]
        );
        assert_eq!(
            attestation_opts(&request(AttestationMode::Max, vec![])),
            vec!["attest:sbom=", "attest:provenance=mode=max"]
        );
    }

    #[test]
    fn test_declarations_override_mode() {
        let opts = attestation_opts(&request(
            AttestationMode::Max,
            vec![AttestationDeclaration::new(AttestationKind::Sbom)],
        ));
        assert_eq!(opts, vec!["attest:sbom="]);
    }

    #[test]
    fn test_sbom_generator_first_and_scan_build_args() {
        let sbom = AttestationDeclaration::new(AttestationKind::Sbom)
            .with_param("zeta", "1")
            .with_param("alpha", "2")
            .with_param("generator", "docker/buildkit-syft-scanner")
            .with_param("scan-context", "true")
            .with_param("scan-stage", "builder");

        assert_eq!(
            declaration_opts(&sbom),
            vec![
                "attest:sbom=generator=docker/buildkit-syft-scanner,alpha=2,zeta=1",
                "build-arg:BUILDKIT_SBOM_SCAN_CONTEXT=true",
                "build-arg:BUILDKIT_SBOM_SCAN_STAGE=builder",
            ]
        );
    }

    #[test]
    fn test_provenance_field_order() {
        let provenance = AttestationDeclaration::new(AttestationKind::Provenance)
            .with_param("custom", "x")
            .with_param("filename", "prov.json")
            .with_param("builder-id", "https://ci.example/run/1")
            .with_param("abc", "y")
            .with_param("reproducible", "true");

        assert_eq!(
            declaration_opts(&provenance),
            vec!["attest:provenance=mode=max,builder-id=https://ci.example/run/1,reproducible=true,filename=prov.json,abc=y,custom=x"]
        );

        let min = AttestationDeclaration::new(AttestationKind::Provenance).with_param("mode", "min");
        assert_eq!(declaration_opts(&min), vec!["attest:provenance=mode=min"]);
    }

    #[test]
    fn test_declarations_keep_their_order() {
        let opts = attestation_opts(&request(
            AttestationMode::Off,
            vec![
                AttestationDeclaration::new(AttestationKind::Provenance),
                "type=sbom,generator=syft".parse().unwrap(),
            ],
        ));
        assert_eq!(
            opts,
            vec!["attest:provenance=mode=max", "attest:sbom=generator=syft"]
        );
    }
}
