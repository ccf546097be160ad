//! Digest extraction from backend output
//!
//! The backends only report digests as log text. Each rule here knows where
//! one backend prints it; a miss is normal and yields `None`.

use kiln_core::CommandOutput;
use kiln_image::Digest;
use regex::Regex;
use std::sync::LazyLock;

static MANIFEST_LIST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"exporting manifest list (sha256:[0-9a-f]{64})\b")
        .expect("manifest list regex is valid")
});

static MANIFEST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"exporting manifest (sha256:[0-9a-f]{64})\b").expect("manifest regex is valid")
});

static ANY_DIGEST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(sha256:[0-9a-f]{64})\b").expect("digest regex is valid"));

static BUILDAH_CONFIG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Copying config (sha256:[0-9a-f]{64})\b").expect("copying config regex is valid")
});

/// Pulls an image digest out of a finished command's output
pub trait DigestExtractor {
    fn extract(&self, output: &CommandOutput) -> Option<Digest>;
}

/// `buildctl build` output
///
/// A manifest list digest wins over a single manifest; as a last resort
/// any digest printed on stdout is taken.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildkitBuildDigest;

impl DigestExtractor for BuildkitBuildDigest {
    fn extract(&self, output: &CommandOutput) -> Option<Digest> {
        first_capture(&MANIFEST_LIST_RE, &output.stderr)
            .or_else(|| first_capture(&MANIFEST_RE, &output.stderr))
            .or_else(|| first_capture(&ANY_DIGEST_RE, &output.stdout))
    }
}

/// `buildah push` output
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildahPushDigest;

impl DigestExtractor for BuildahPushDigest {
    fn extract(&self, output: &CommandOutput) -> Option<Digest> {
        first_capture(&BUILDAH_CONFIG_RE, &output.stderr)
    }
}

fn first_capture(re: &Regex, text: &str) -> Option<Digest> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| Digest::parse(m.as_str()).ok())
}
