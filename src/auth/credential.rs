//! Cluster credential encoding.
//!
//! Wire format: `ClusterKey <lowercase-hex-secret>`.

use std::fmt;

use thiserror::Error;

use super::SharedKey;

/// Scheme token marking a cluster-internal credential.
pub const CLUSTER_KEY_SCHEME: &str = "ClusterKey";

/// Reason a request source was not accepted.
///
/// Only used for debug tracing. Callers of source verification see a
/// plain `false` whatever the reason.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    #[error("no authorization metadata")]
    Missing,

    #[error("multiple authorization values")]
    Ambiguous,

    #[error("unsupported authorization scheme")]
    WrongScheme,

    #[error("malformed credential")]
    Malformed,

    #[error("credential payload is not valid hex")]
    InvalidHex,

    #[error("no shared keys configured")]
    NoKeys,

    #[error("credential does not match any shared key")]
    UnknownKey,
}

/// A parsed or freshly built cluster credential.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    secret: Vec<u8>,
}

impl Credential {
    /// Build the credential presented by outbound calls.
    pub fn from_key(key: &SharedKey) -> Self {
        Self {
            secret: key.as_bytes().to_vec(),
        }
    }

    /// Parse an `authorization` metadata value.
    pub fn parse(value: &str) -> Result<Self, Rejection> {
        let (scheme, payload) = value.split_once(' ').ok_or(Rejection::Malformed)?;
        if scheme != CLUSTER_KEY_SCHEME {
            return Err(Rejection::WrongScheme);
        }
        if payload.is_empty() {
            return Err(Rejection::Malformed);
        }
        let secret = hex::decode(payload).map_err(|_| Rejection::InvalidHex)?;
        Ok(Self { secret })
    }

    /// Decoded secret bytes.
    pub fn secret(&self) -> &[u8] {
        &self.secret
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", CLUSTER_KEY_SCHEME, hex::encode(&self.secret))
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("scheme", &CLUSTER_KEY_SCHEME)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}
