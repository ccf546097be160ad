//! Content digests

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

static DIGEST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^sha256:[0-9a-f]{64}$").expect("digest regex is valid"));

/// A `sha256:<64 lowercase hex>` image digest
///
/// Kiln never computes digests; it only carries the ones reported by the
/// backends, so construction validates the shape and nothing more.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Digest(String);

impl Digest {
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if DIGEST_RE.is_match(value) {
            Ok(Self(value.to_string()))
        } else {
            Err(Error::invalid_digest(value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The hex part, without the algorithm prefix
    pub fn hex(&self) -> &str {
        &self.0["sha256:".len()..]
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Digest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Digest per destination; a destination without a digest has no entry
pub type DigestMap = BTreeMap<String, Digest>;

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(c: char) -> String {
        std::iter::repeat(c).take(64).collect()
    }

    #[test]
    fn test_parse_valid() {
        let digest = Digest::parse(&format!(" sha256:{}\n", hex('a'))).unwrap();
        assert_eq!(digest.as_str(), format!("sha256:{}", hex('a')));
        assert_eq!(digest.hex(), hex('a'));
    }

    #[test]
    fn test_parse_invalid() {
        assert!(Digest::parse("").is_err());
        assert!(Digest::parse("sha256:").is_err());
        assert!(Digest::parse(&format!("sha256:{}", &hex('a')[..63])).is_err());
        assert!(Digest::parse(&format!("sha256:{}", hex('A'))).is_err());
        assert!(Digest::parse(&format!("sha512:{}", hex('a'))).is_err());
        assert!(Digest::parse(&format!("sha256:{}0", hex('a'))).is_err());
    }

    #[test]
    fn test_serializes_as_string() {
        let digest = Digest::parse(&format!("sha256:{}", hex('b'))).unwrap();
        assert_eq!(
            serde_json::to_string(&digest).unwrap(),
            format!("\"sha256:{}\"", hex('b'))
        );
    }
}
