//! SHA-256 fingerprints for source repositories and compiled schemas

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 digest
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum(String);

impl Checksum {
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(format!("{:x}", Sha256::digest(data)))
    }

    /// Digest of a JSON value's compact serialization
    pub fn from_json(value: &serde_json::Value) -> Self {
        let canonical = serde_json::to_vec(value).unwrap_or_default();
        Self::from_bytes(&canonical)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Accumulates file contents in a stable order into one fingerprint
#[derive(Default)]
pub struct Fingerprint {
    hasher: Sha256,
}

impl Fingerprint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one file; the path participates so renames change the digest
    pub fn update(&mut self, path: &str, content: &[u8]) {
        self.hasher.update(path.as_bytes());
        self.hasher.update([0u8]);
        self.hasher.update(content);
        self.hasher.update([0u8]);
    }

    pub fn finish(self) -> Checksum {
        Checksum(format!("{:x}", self.hasher.finalize()))
    }
}
