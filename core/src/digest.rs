//! Content digests.
//!
//! Only `sha256` is supported. The canonical form is `sha256:<64 lowercase hex>`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use crate::error::{Result, StoreError};

/// Digest algorithm prefix.
pub const SHA256_PREFIX: &str = "sha256:";

/// Length of a hex-encoded sha256 digest.
pub const SHA256_HEX_LEN: usize = 64;

/// Number of hex characters shown in abbreviated digests.
pub const SHORT_HEX_LEN: usize = 12;

/// Content-addressable identifier of a stored blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest(String);

impl Digest {
    /// Parse a `sha256:<hex>` literal.
    pub fn parse(s: &str) -> Result<Self> {
        let hex_part = s
            .strip_prefix(SHA256_PREFIX)
            .ok_or_else(|| StoreError::InvalidDigest(format!("{s}: expected sha256:<hex>")))?;
        if !is_sha256_hex(hex_part) {
            return Err(StoreError::InvalidDigest(format!(
                "{s}: expected {SHA256_HEX_LEN} lowercase hex characters"
            )));
        }
        Ok(Self(s.to_string()))
    }

    /// Parse a bare 64-character hex string as a sha256 digest.
    pub fn from_hex(hex_part: &str) -> Result<Self> {
        Self::parse(&format!("{SHA256_PREFIX}{hex_part}"))
    }

    /// Compute the sha256 digest of `data`.
    pub fn compute(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(format!("{SHA256_PREFIX}{}", hex::encode(hash)))
    }

    /// The hex part, without the algorithm prefix.
    pub fn hex(&self) -> &str {
        &self.0[SHA256_PREFIX.len()..]
    }

    /// `sha256:` plus the first 12 hex characters.
    pub fn short(&self) -> &str {
        &self.0[..SHA256_PREFIX.len() + SHORT_HEX_LEN]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Whether `s` is exactly 64 lowercase hex characters.
pub fn is_sha256_hex(s: &str) -> bool {
    s.len() == SHA256_HEX_LEN && is_lower_hex(s)
}

/// Whether `s` is non-empty and made only of lowercase hex characters.
pub fn is_lower_hex(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Digest {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Digest {
    type Error = StoreError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<Digest> for String {
    fn from(digest: Digest) -> Self {
        digest.0
    }
}

impl AsRef<str> for Digest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
