//! Source verification for inbound cluster calls.

use std::sync::Arc;

use tracing::debug;

use crate::metadata::{RequestMetadata, AUTHORIZATION};

use super::{Credential, KeyStore, Rejection};

/// Decides whether inbound request metadata proves cluster membership.
pub struct SourceAuthenticator {
    keys: Arc<KeyStore>,
}

impl SourceAuthenticator {
    pub fn new(keys: Arc<KeyStore>) -> Self {
        Self { keys }
    }

    /// Verify that the request carries a valid cluster credential.
    ///
    /// Every failure is a plain `false`; the reason is only traced at debug
    /// level.
    pub fn verify_source(&self, metadata: &RequestMetadata) -> bool {
        match self.check(metadata) {
            Ok(()) => true,
            Err(rejection) => {
                debug!(reason = %rejection, "Cluster source rejected");
                false
            }
        }
    }

    /// Checks:
    /// 1. Exactly one `authorization` value is present
    /// 2. It parses as a `ClusterKey` credential
    /// 3. The secret matches one of the current keys
    fn check(&self, metadata: &RequestMetadata) -> Result<(), Rejection> {
        let value = match metadata.get_all(AUTHORIZATION) {
            [] => return Err(Rejection::Missing),
            [value] => value,
            _ => return Err(Rejection::Ambiguous),
        };

        let credential = Credential::parse(value)?;

        let keys = self.keys.current_keys();
        if keys.is_empty() {
            return Err(Rejection::NoKeys);
        }

        // Visit every key, no early exit on match
        let matched = keys
            .iter()
            .fold(false, |matched, key| key.ct_eq(credential.secret()) | matched);

        if matched {
            Ok(())
        } else {
            Err(Rejection::UnknownKey)
        }
    }
}
