//! SHA-256 digest of a converted CRX payload, as lowercase hex.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

/// Hex-encoded SHA-256 digest, serialised as a plain string.
///
/// # Examples
///
/// ```
/// use addon_ingest::digest::Sha256Digest;
///
/// let digest = Sha256Digest::of(b"payload");
/// assert_eq!(digest.as_str().len(), 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Sha256Digest(String);

impl Sha256Digest {
    /// Hash `bytes` in one call.
    #[must_use]
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self::from_hasher(hasher)
    }

    /// Finish a streaming hasher into a digest.
    #[must_use]
    pub fn from_hasher(hasher: Sha256) -> Self {
        Self(format!("{:x}", hasher.finalize()))
    }

    /// The digest as lowercase hex.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
