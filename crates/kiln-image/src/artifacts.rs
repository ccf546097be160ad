//! Digest artifact files

use crate::digest::Digest;
use crate::error::Result;
use crate::reference::pin_to_digest;
use kiln_core::types::ArtifactPaths;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

/// Contents of the JSON digest file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DigestRecord {
    pub image: String,
    pub digest: Digest,
}

/// Write every configured artifact file for `image`
///
/// Parent directories are created as needed. Nothing is written when no
/// path is configured.
pub fn write_artifacts(paths: &ArtifactPaths, image: &str, digest: &Digest) -> Result<()> {
    if let Some(path) = &paths.digest_file {
        write_file(path, digest.as_str())?;
    }

    if let Some(path) = &paths.image_name_with_digest_file {
        write_file(path, &pin_to_digest(image, digest))?;
    }

    if let Some(path) = &paths.digest_json_file {
        let record = DigestRecord {
            image: image.to_string(),
            digest: digest.clone(),
        };
        write_file(path, &serde_json::to_string(&record)?)?;
    }

    if !paths.is_empty() {
        info!("Wrote digest artifacts for {}", image);
    }
    Ok(())
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)?;
    debug!("Wrote {}", path.display());
    Ok(())
}
