//! Image references

use crate::digest::Digest;

/// Registry assumed when a reference names none
pub const DEFAULT_REGISTRY: &str = "docker.io";

/// Drop the `:tag` from `name`, ignoring a `:` that belongs to a registry port
fn strip_tag(name: &str) -> &str {
    let last_slash = name.rfind('/').map(|i| i + 1).unwrap_or(0);
    match name[last_slash..].rfind(':') {
        Some(i) => &name[..last_slash + i],
        None => name,
    }
}

fn looks_like_registry(component: &str) -> bool {
    component.contains('.') || component.contains(':') || component == "localhost"
}

/// Registry host of an image reference, including any port
pub fn registry_host(image: &str) -> &str {
    let name = image.split('@').next().unwrap_or(image);
    match name.split_once('/') {
        Some((first, _)) if looks_like_registry(first) => first,
        _ => DEFAULT_REGISTRY,
    }
}

/// Replace any tag or digest on `image` with `digest`
///
/// `localhost:5000/app:1.0` becomes `localhost:5000/app@sha256:...`; the
/// registry is kept as written.
pub fn pin_to_digest(image: &str, digest: &Digest) -> String {
    let name = image.trim().split('@').next().unwrap_or_default();
    format!("{}@{}", strip_tag(name), digest)
}
