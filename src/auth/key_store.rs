//! Rotating set of shared keys.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, warn};

use crate::error::{ClusterError, ClusterResult, MisconfigurationKind};

use super::SharedKey;

#[derive(Default)]
struct KeyRing {
    /// Valid keys, oldest first.
    keys: Vec<SharedKey>,
    /// Designated primary for outbound credentials. `None` means newest.
    signing: Option<SharedKey>,
}

/// Ordered set of shared keys, all accepted for inbound verification.
///
/// Rotation: add the new key on every instance, wait for it to propagate,
/// then remove the old key. Removal is not guarded against keys that peers
/// still present.
#[derive(Default)]
pub struct KeyStore {
    ring: RwLock<KeyRing>,
}

impl KeyStore {
    /// Create a key store holding `keys` in order. Duplicates are dropped.
    pub fn new(keys: impl IntoIterator<Item = SharedKey>) -> Self {
        let store = Self::default();
        for key in keys {
            store.add_key(key);
        }
        store
    }

    fn read(&self) -> RwLockReadGuard<'_, KeyRing> {
        match self.ring.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(), // Recover from lock poisoning
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, KeyRing> {
        match self.ring.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Snapshot of the valid keys, oldest first.
    pub fn current_keys(&self) -> Vec<SharedKey> {
        self.read().keys.clone()
    }

    /// Add a key. Returns `false` if it was already present.
    pub fn add_key(&self, key: SharedKey) -> bool {
        let mut ring = self.write();
        if ring.keys.contains(&key) {
            return false;
        }
        debug!(fingerprint = %key.fingerprint(), "Shared key added");
        ring.keys.push(key);
        true
    }

    /// Remove a key. Returns `false` if it was not present.
    ///
    /// Removing the designated signing key falls back to the newest key.
    pub fn remove_key(&self, key: &SharedKey) -> bool {
        let mut ring = self.write();
        let before = ring.keys.len();
        ring.keys.retain(|k| k != key);
        if ring.keys.len() == before {
            return false;
        }
        if ring.signing.as_ref() == Some(key) {
            ring.signing = None;
        }
        debug!(fingerprint = %key.fingerprint(), "Shared key removed");
        if ring.keys.is_empty() {
            warn!("Last shared key removed, all inbound cluster calls will be rejected");
        }
        true
    }

    /// Key used to produce outbound credentials.
    ///
    /// The designated primary if one is set, otherwise the most recently
    /// added key. `None` when the store is empty.
    pub fn signing_key(&self) -> Option<SharedKey> {
        let ring = self.read();
        ring.signing.clone().or_else(|| ring.keys.last().cloned())
    }

    /// Designate the primary signing key. It must already be in the store.
    pub fn set_signing_key(&self, key: &SharedKey) -> ClusterResult<()> {
        let mut ring = self.write();
        if !ring.keys.contains(key) {
            return Err(ClusterError::misconfigured(
                MisconfigurationKind::UnknownSigningKey,
            ));
        }
        ring.signing = Some(key.clone());
        Ok(())
    }

    /// Return to "newest key signs".
    pub fn clear_signing_key(&self) {
        self.write().signing = None;
    }

    /// Replace the whole key set in one write.
    ///
    /// Concurrent readers see either the old or the new set. An empty set or
    /// a signing key outside the new set is rejected and leaves the store
    /// untouched.
    pub fn replace(
        &self,
        keys: impl IntoIterator<Item = SharedKey>,
        signing: Option<SharedKey>,
    ) -> ClusterResult<()> {
        let mut next: Vec<SharedKey> = Vec::new();
        for key in keys {
            if !next.contains(&key) {
                next.push(key);
            }
        }
        if next.is_empty() {
            return Err(ClusterError::misconfigured(MisconfigurationKind::NoKeys));
        }
        if let Some(signing) = &signing {
            if !next.contains(signing) {
                return Err(ClusterError::misconfigured(
                    MisconfigurationKind::UnknownSigningKey,
                ));
            }
        }

        let mut ring = self.write();
        ring.keys = next;
        ring.signing = signing;
        Ok(())
    }

    pub fn contains(&self, key: &SharedKey) -> bool {
        self.read().keys.contains(key)
    }

    /// Number of valid keys.
    pub fn len(&self) -> usize {
        self.read().keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
