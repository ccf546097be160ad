//! `$VAR` / `${VAR}` expansion for context strings

use regex::{Captures, Regex};
use std::sync::LazyLock;

static VAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
        .expect("variable regex is valid")
});

/// Substitute environment references; undefined variables expand to ""
pub fn expand_env<F>(input: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    VAR_RE
        .replace_all(input, |caps: &Captures<'_>| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            lookup(name).unwrap_or_default()
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "ORG" => Some("acme".to_string()),
            "REF" => Some("v1.2".to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_expand_both_forms() {
        assert_eq!(
            expand_env("https://github.com/$ORG/app.git#${REF}", lookup),
            "https://github.com/acme/app.git#v1.2"
        );
    }

    #[test]
    fn test_undefined_expands_to_empty() {
        assert_eq!(expand_env("/src/$MISSING/app", lookup), "/src//app");
        assert_eq!(expand_env("${MISSING}", lookup), "");
    }

    #[test]
    fn test_plain_strings_untouched() {
        assert_eq!(expand_env("./context", lookup), "./context");
        assert_eq!(expand_env("cost$", lookup), "cost$");
        assert_eq!(expand_env("$1abc", lookup), "$1abc");
    }
}
