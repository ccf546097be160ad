//! Git URL classification and rewriting

use kiln_core::types::GitConfig;
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Hosts whose `git://` URLs are served over HTTPS as well
pub const KNOWN_HOSTS: [&str; 3] = ["github.com", "gitlab.com", "bitbucket.org"];

/// Placeholder substituted for secrets in logged URLs
pub const MASK: &str = "***";

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z][A-Za-z0-9+.-]*://[^\s'\x22]+").expect("url regex is valid")
});

/// Split `url#fragment` into its two halves
pub fn split_fragment(url: &str) -> (&str, Option<&str>) {
    match url.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (url, None),
    }
}

/// Split a `ref:subpath` fragment into its optional parts
pub fn parse_fragment(fragment: &str) -> (Option<&str>, Option<&str>) {
    let (reference, subpath) = match fragment.split_once(':') {
        Some((reference, subpath)) => (reference, Some(subpath)),
        None => (fragment, None),
    };
    let non_empty: fn(&str) -> Option<&str> = |s| {
        let s = s.trim();
        (!s.is_empty()).then_some(s)
    };
    (non_empty(reference), subpath.and_then(non_empty))
}

/// Fill unset git options from a `#ref:subpath` fragment
///
/// Explicit options win over the fragment.
pub fn apply_fragment(git: &GitConfig, fragment: Option<&str>) -> GitConfig {
    let mut merged = git.clone();
    let Some(fragment) = fragment else {
        return merged;
    };
    let (reference, subpath) = parse_fragment(fragment);
    if merged.effective_ref().is_none() {
        merged.branch = reference.map(String::from);
    }
    if merged.subpath().is_none() {
        merged.subpath = subpath.map(String::from);
    }
    merged
}

/// Whether a context string refers to a git repository
///
/// Only the part before `#` is inspected.
pub fn is_git_url(context: &str) -> bool {
    let base = split_fragment(context.trim()).0;

    if base.starts_with("git://") || base.starts_with("git@") {
        return true;
    }
    if KNOWN_HOSTS
        .iter()
        .any(|host| base.starts_with(&format!("https://{}/", host)))
    {
        return true;
    }
    if base.ends_with(".git") || has_git_subdomain(base) {
        return true;
    }

    match base.strip_prefix("https://") {
        Some(rest) => rest
            .split_once('/')
            .is_some_and(|(_, path)| !path.trim_matches('/').is_empty()),
        None => false,
    }
}

fn has_git_subdomain(url: &str) -> bool {
    let Some((_, rest)) = url.split_once("://") else {
        return false;
    };
    let authority = rest.split('/').next().unwrap_or_default();
    let host = authority.rsplit('@').next().unwrap_or_default();
    host.split('.').next() == Some("git") && host.contains('.')
}

/// Rewrite a git URL into the form handed to git or buildkit
///
/// `git://` on a known host becomes `https://`; `git@host:owner/repo` becomes
/// `https://host/owner/repo` unless `prefer_ssh` is set. The fragment, if
/// any, is preserved.
pub fn normalize_url(url: &str, prefer_ssh: bool) -> String {
    let url = url.trim();
    let (base, fragment) = split_fragment(url);

    let normalized = if let Some(rest) = base.strip_prefix("git://") {
        let host = rest.split('/').next().unwrap_or_default();
        if KNOWN_HOSTS.contains(&host) {
            format!("https://{}", rest)
        } else {
            base.to_string()
        }
    } else if let Some(rest) = base.strip_prefix("git@") {
        match rest.split_once(':') {
            Some((host, path)) if !prefer_ssh => format!("https://{}/{}", host, path),
            _ => base.to_string(),
        }
    } else {
        base.to_string()
    };

    match fragment {
        Some(fragment) => format!("{}#{}", normalized, fragment),
        None => normalized,
    }
}

/// Embed an access token into an HTTPS URL
///
/// The token is trimmed and the user defaults to `oauth2`. URLs that are not
/// HTTPS or already carry credentials are returned unchanged, so applying
/// this twice is a no-op.
pub fn add_token(url: &str, token: &str, user: &str) -> String {
    let token = token.trim();
    if token.is_empty() {
        return url.to_string();
    }
    let Some(rest) = url.strip_prefix("https://") else {
        return url.to_string();
    };

    let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    if rest[..authority_end].contains('@') {
        return url.to_string();
    }

    let user = match user.trim() {
        "" => kiln_core::types::DEFAULT_TOKEN_USER,
        user => user,
    };
    format!("https://{}:{}@{}", user, token, rest)
}

/// BuildKit-native reference: `url[#ref[:subpath]]`
///
/// Revision wins over branch; a bare subpath gives `url#:subpath`. Any
/// fragment already on `url` is replaced when options are set.
pub fn format_native_ref(url: &str, git: &GitConfig) -> String {
    match (git.effective_ref(), git.subpath()) {
        (None, None) => url.to_string(),
        (reference, subpath) => {
            let base = split_fragment(url).0;
            let mut out = format!("{}#{}", base, reference.unwrap_or_default());
            if let Some(subpath) = subpath {
                out.push(':');
                out.push_str(subpath);
            }
            out
        }
    }
}

/// Replace the password (or bare token) in a URL with `***`
///
/// User, host, path, query and fragment are preserved. SSH shorthand and
/// credential-free URLs pass through unchanged.
pub fn mask_token(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_string();
    };
    let (scheme, rest) = (&url[..scheme_end], &url[scheme_end + 3..]);

    let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let (authority, tail) = rest.split_at(authority_end);
    let Some(at) = authority.rfind('@') else {
        return url.to_string();
    };
    let (userinfo, host) = (&authority[..at], &authority[at + 1..]);

    let masked_userinfo = match userinfo.split_once(':') {
        Some((user, _)) => format!("{}:{}", user, MASK),
        None => MASK.to_string(),
    };
    format!("{}://{}@{}{}", scheme, masked_userinfo, host, tail)
}

/// Mask credentials in every URL found in free text
pub fn mask_credentials(text: &str) -> String {
    URL_RE
        .replace_all(text, |caps: &Captures<'_>| mask_token(&caps[0]))
        .into_owned()
}
