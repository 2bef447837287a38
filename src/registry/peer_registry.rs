//! Registry of known peers.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::error::{ClusterError, ClusterResult};
use crate::peer::{Peer, Role};

/// Primary map and role index, always mutated together under one lock.
#[derive(Default)]
struct Members {
    /// Identifier -> peer.
    peers: BTreeMap<String, Arc<Peer>>,
    /// Role -> identifiers of peers serving it.
    by_role: HashMap<Role, BTreeSet<String>>,
}

impl Members {
    fn unindex(&mut self, peer: &Peer) {
        for role in peer.roles() {
            if let Some(bucket) = self.by_role.get_mut(role) {
                bucket.remove(peer.identifier());
                if bucket.is_empty() {
                    self.by_role.remove(role);
                }
            }
        }
    }
}

/// Thread-safe peer registry.
///
/// Every registration or removal happens under a single write lock, so
/// readers never observe the role index out of step with the primary map.
#[derive(Default)]
pub struct PeerRegistry {
    members: RwLock<Members>,
}

impl PeerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Members> {
        match self.members.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(), // Recover from lock poisoning
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Members> {
        match self.members.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Insert or replace a peer under its identifier.
    ///
    /// Returns the descriptor that was replaced, if any. Stale role buckets
    /// of the replaced descriptor are purged.
    pub fn register(&self, peer: Peer) -> Option<Arc<Peer>> {
        let peer = Arc::new(peer);
        let mut members = self.write();

        let previous = members
            .peers
            .insert(peer.identifier().to_string(), Arc::clone(&peer));
        if let Some(previous) = &previous {
            members.unindex(previous);
        }
        for role in peer.roles() {
            members
                .by_role
                .entry(*role)
                .or_default()
                .insert(peer.identifier().to_string());
        }

        debug!(
            identifier = %peer.identifier(),
            roles = ?peer.roles(),
            replaced = previous.is_some(),
            "Peer registered"
        );
        previous
    }

    /// Remove a peer and purge it from every role bucket.
    ///
    /// Absent identifiers are a no-op.
    pub fn remove(&self, identifier: &str) -> Option<Arc<Peer>> {
        let mut members = self.write();
        let removed = members.peers.remove(identifier)?;
        members.unindex(&removed);
        debug!(identifier = %identifier, "Peer removed");
        Some(removed)
    }

    /// Look up a peer by identifier.
    pub fn get_by_identifier(&self, identifier: &str) -> ClusterResult<Arc<Peer>> {
        self.read()
            .peers
            .get(identifier)
            .cloned()
            .ok_or_else(|| ClusterError::NotFound {
                identifier: identifier.to_string(),
            })
    }

    /// All peers serving `role`, ordered by identifier. Empty if none.
    pub fn get_by_role(&self, role: Role) -> Vec<Arc<Peer>> {
        let members = self.read();
        members
            .by_role
            .get(&role)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| members.peers.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All registered peers, ordered by identifier.
    pub fn all(&self) -> Vec<Arc<Peer>> {
        self.read().peers.values().cloned().collect()
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.read().peers.contains_key(identifier)
    }

    /// Number of registered peers.
    pub fn len(&self) -> usize {
        self.read().peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn identifiers(peers: &[Arc<Peer>]) -> Vec<&str> {
        peers.iter().map(|p| p.identifier()).collect()
    }

    #[test]
    fn test_lookup_by_role_and_identifier() {
        let registry = PeerRegistry::new();
        registry.register(Peer::new("ns-1", [Role::NetworkServer], "ns-1:8884"));

        let peers = registry.get_by_role(Role::NetworkServer);
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].identifier(), "ns-1");
        assert!(registry.get_by_role(Role::JoinServer).is_empty());

        let peer = registry.get_by_identifier("ns-1").unwrap();
        assert_eq!(peer.address(), "ns-1:8884");

        assert!(matches!(
            registry.get_by_identifier("missing"),
            Err(ClusterError::NotFound { identifier }) if identifier == "missing"
        ));
    }

    #[test]
    fn test_register_is_idempotent() {
        let registry = PeerRegistry::new();
        let peer = Peer::new("as-1", [Role::ApplicationServer], "as-1:8884");

        assert!(registry.register(peer.clone()).is_none());
        assert!(registry.register(peer).is_some());

        assert_eq!(registry.len(), 1);
        assert_eq!(
            identifiers(&registry.get_by_role(Role::ApplicationServer)),
            vec!["as-1"]
        );
    }

    #[test]
    fn test_reregister_moves_role_buckets() {
        let registry = PeerRegistry::new();
        registry.register(Peer::new(
            "p",
            [Role::NetworkServer, Role::JoinServer],
            "p:1",
        ));
        registry.register(Peer::new(
            "p",
            [Role::JoinServer, Role::ApplicationServer],
            "p:2",
        ));

        assert!(registry.get_by_role(Role::NetworkServer).is_empty());
        assert_eq!(identifiers(&registry.get_by_role(Role::JoinServer)), vec!["p"]);
        assert_eq!(
            identifiers(&registry.get_by_role(Role::ApplicationServer)),
            vec!["p"]
        );
        assert_eq!(registry.get_by_identifier("p").unwrap().address(), "p:2");
    }

    #[test]
    fn test_remove_purges_role_index() {
        let registry = PeerRegistry::new();
        registry.register(Peer::new("js-1", [Role::JoinServer], "js-1:1"));
        registry.register(Peer::new("js-2", [Role::JoinServer], "js-2:1"));

        assert!(registry.remove("js-1").is_some());
        assert_eq!(identifiers(&registry.get_by_role(Role::JoinServer)), vec!["js-2"]);
        assert!(!registry.contains("js-1"));

        // Removing again is a no-op
        assert!(registry.remove("js-1").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_role_results_ordered_by_identifier() {
        let registry = PeerRegistry::new();
        for id in ["gs-3", "gs-1", "gs-2"] {
            registry.register(Peer::new(id, [Role::GatewayServer], "gs"));
        }
        assert_eq!(
            identifiers(&registry.get_by_role(Role::GatewayServer)),
            vec!["gs-1", "gs-2", "gs-3"]
        );
    }

    #[test]
    fn test_concurrent_readers_never_see_partial_updates() {
        let registry = Arc::new(PeerRegistry::new());

        let writer = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for i in 0..500 {
                    let roles = if i % 2 == 0 {
                        vec![Role::NetworkServer]
                    } else {
                        vec![Role::NetworkServer, Role::JoinServer]
                    };
                    registry.register(Peer::new(format!("ns-{}", i % 10), roles, "addr"));
                    if i % 7 == 0 {
                        registry.remove(&format!("ns-{}", i % 10));
                    }
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for _ in 0..500 {
                        for peer in registry.get_by_role(Role::JoinServer) {
                            assert!(peer.has_role(Role::JoinServer));
                        }
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }

        for peer in registry.get_by_role(Role::NetworkServer) {
            assert!(registry.contains(peer.identifier()));
        }
    }
}
