//! Shared symmetric cluster keys.

use std::fmt;
use std::sync::Arc;

use ring::digest;

use crate::error::{ClusterError, ClusterResult, MisconfigurationKind};

/// A raw shared secret known to every legitimate cluster member.
///
/// Equality is constant-time. `Debug` never prints the secret.
#[derive(Clone)]
pub struct SharedKey {
    bytes: Arc<[u8]>,
}

impl SharedKey {
    /// Wrap raw key bytes. Empty keys are rejected.
    pub fn new(bytes: impl Into<Vec<u8>>) -> ClusterResult<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(ClusterError::misconfigured(MisconfigurationKind::InvalidKey {
                message: "key is empty".to_string(),
            }));
        }
        Ok(Self {
            bytes: bytes.into(),
        })
    }

    /// Decode a hex-encoded key.
    pub fn from_hex(encoded: &str) -> ClusterResult<Self> {
        let bytes = hex::decode(encoded.trim()).map_err(|e| {
            ClusterError::misconfigured(MisconfigurationKind::InvalidKey {
                message: format!("invalid hex: {}", e),
            })
        })?;
        Self::new(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Lowercase hex encoding of the key.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// Short, non-reversible identifier of the key for logs and audit records.
    ///
    /// First 8 bytes of the SHA-256 digest, hex-encoded.
    pub fn fingerprint(&self) -> String {
        let hash = digest::digest(&digest::SHA256, &self.bytes);
        hex::encode(&hash.as_ref()[..8])
    }

    /// Compare against candidate bytes in constant time.
    pub fn ct_eq(&self, candidate: &[u8]) -> bool {
        constant_time_eq(&self.bytes, candidate)
    }
}

impl PartialEq for SharedKey {
    fn eq(&self, other: &Self) -> bool {
        self.ct_eq(&other.bytes)
    }
}

impl Eq for SharedKey {}

impl fmt::Debug for SharedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedKey")
            .field("bytes", &"[REDACTED]")
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

/// Constant-time byte comparison (prevents timing attacks).
///
/// Only the length comparison exits early; every byte is visited otherwise.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
