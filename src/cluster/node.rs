//! The cluster handle shared by every service component.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::audit::{AuditEntry, AuditEvent, AuditSink};
use crate::auth::{Credential, KeyStore, SharedKey, SourceAuthenticator};
use crate::config::{KeysConfig, PeerConfig, Settings};
use crate::error::{ClusterError, ClusterResult, MisconfigurationKind};
use crate::metadata::{RequestMetadata, AUTHORIZATION, PEER_IDENTIFIER};
use crate::peer::{Peer, Role};
use crate::registry::PeerRegistry;

/// Outcome of reconciling the statically configured peers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StaticPeerSync {
    /// Peers registered or updated.
    pub joined: usize,
    /// Configured peers already registered with the same descriptor.
    pub unchanged: usize,
    /// Peers removed because they left the configuration.
    pub left: usize,
    /// Entries refused, such as the local identifier.
    pub skipped: usize,
}

/// Cluster membership and source authentication for one instance.
///
/// Lookups and source verification are in-memory and never block on I/O.
/// Mutations (membership and key changes) additionally hand one entry to the
/// audit sink, which is the only I/O collaborator on those paths.
pub struct Cluster {
    self_peer: Arc<Peer>,
    registry: PeerRegistry,
    keys: Arc<KeyStore>,
    authenticator: SourceAuthenticator,
    audit: Arc<dyn AuditSink>,
}

impl Cluster {
    /// Create the cluster handle for the local instance.
    ///
    /// Fails when the local identity is incomplete or no key is configured;
    /// the instance must not start in that state. The local peer is
    /// registered so role lookups include it.
    pub fn new(self_peer: Peer, keys: KeyStore, audit: Arc<dyn AuditSink>) -> ClusterResult<Self> {
        if self_peer.identifier().trim().is_empty() {
            return Err(ClusterError::misconfigured(
                MisconfigurationKind::EmptyIdentifier,
            ));
        }
        if self_peer.roles().is_empty() {
            return Err(ClusterError::misconfigured(MisconfigurationKind::NoSelfRoles));
        }
        if keys.is_empty() {
            return Err(ClusterError::misconfigured(MisconfigurationKind::NoKeys));
        }

        let keys = Arc::new(keys);
        let registry = PeerRegistry::new();
        registry.register(self_peer.clone());

        info!(
            identifier = %self_peer.identifier(),
            roles = ?self_peer.roles(),
            keys = keys.len(),
            "Cluster initialized"
        );

        Ok(Self {
            self_peer: Arc::new(self_peer),
            registry,
            authenticator: SourceAuthenticator::new(Arc::clone(&keys)),
            keys,
            audit,
        })
    }

    /// Build the cluster from loaded settings, registering static peers.
    pub fn from_settings(settings: &Settings, audit: Arc<dyn AuditSink>) -> ClusterResult<Self> {
        let keys = KeyStore::new(settings.keys.resolve()?);
        if let Some(signing) = settings.keys.resolve_signing()? {
            keys.set_signing_key(&signing)?;
        }

        let cluster = Self::new(settings.node.to_peer(), keys, audit)?;
        for peer in &settings.peers {
            cluster.join(peer.to_peer())?;
        }
        Ok(cluster)
    }

    /// The local instance's identity.
    pub fn self_peer(&self) -> Arc<Peer> {
        Arc::clone(&self.self_peer)
    }

    /// All peers serving `role`, ordered by identifier.
    ///
    /// Empty when none is registered; callers decide whether that is fatal.
    pub fn get_peers(&self, role: Role) -> Vec<Arc<Peer>> {
        self.registry.get_by_role(role)
    }

    /// The first peer serving `role`, by identifier order.
    pub fn first_peer(&self, role: Role) -> Option<Arc<Peer>> {
        self.get_peers(role).into_iter().next()
    }

    /// Look up a peer by identifier.
    pub fn get_peer(&self, identifier: &str) -> ClusterResult<Arc<Peer>> {
        self.registry.get_by_identifier(identifier)
    }

    /// Every known peer, including the local one.
    pub fn peers(&self) -> Vec<Arc<Peer>> {
        self.registry.all()
    }

    pub fn peer_count(&self) -> usize {
        self.registry.len()
    }

    /// Register or update a peer.
    pub fn join(&self, peer: Peer) -> ClusterResult<()> {
        self.guard_self(peer.identifier())?;

        let identifier = peer.identifier().to_string();
        let roles: Vec<Role> = peer.roles().iter().copied().collect();
        let address = peer.address().to_string();

        let replaced = self.registry.register(peer).is_some();
        info!(identifier = %identifier, roles = ?roles, replaced, "Peer joined");

        self.record(AuditEvent::PeerJoined {
            identifier,
            roles,
            address,
            replaced,
        });
        Ok(())
    }

    /// Remove a peer. Returns whether it was registered.
    pub fn leave(&self, identifier: &str) -> ClusterResult<bool> {
        self.guard_self(identifier)?;

        let removed = self.registry.remove(identifier).is_some();
        if removed {
            info!(identifier = %identifier, "Peer left");
            self.record(AuditEvent::PeerLeft {
                identifier: identifier.to_string(),
            });
        }
        Ok(removed)
    }

    /// Verify that inbound request metadata carries a valid cluster credential.
    ///
    /// Privileged handlers must call this before any side-effecting work and
    /// answer with access denied on `false`.
    pub fn verify_source(&self, metadata: &RequestMetadata) -> bool {
        self.authenticator.verify_source(metadata)
    }

    /// Credential outbound calls attach under `authorization`.
    pub fn new_cluster_credential(&self) -> ClusterResult<Credential> {
        self.keys
            .signing_key()
            .map(|key| Credential::from_key(&key))
            .ok_or(ClusterError::NoSigningKey)
    }

    /// Metadata for an outbound call: the credential plus the local identifier.
    pub fn outgoing_metadata(&self) -> ClusterResult<RequestMetadata> {
        let mut metadata = RequestMetadata::new();
        metadata.set(AUTHORIZATION, self.new_cluster_credential()?.to_string());
        metadata.set(PEER_IDENTIFIER, self.self_peer.identifier());
        Ok(metadata)
    }

    /// Start accepting a new key.
    pub fn add_key(&self, key: SharedKey) -> bool {
        let fingerprint = key.fingerprint();
        let added = self.keys.add_key(key);
        if added {
            info!(fingerprint = %fingerprint, "Shared key added");
            self.record(AuditEvent::KeyAdded { fingerprint });
        }
        added
    }

    /// Stop accepting a key.
    pub fn remove_key(&self, key: &SharedKey) -> bool {
        let removed = self.keys.remove_key(key);
        if removed {
            let remaining = self.keys.len();
            info!(fingerprint = %key.fingerprint(), remaining, "Shared key removed");
            self.record(AuditEvent::KeyRemoved {
                fingerprint: key.fingerprint(),
                remaining,
            });
        }
        removed
    }

    /// Designate the key used for outbound credentials.
    pub fn set_signing_key(&self, key: &SharedKey) -> ClusterResult<()> {
        self.keys.set_signing_key(key)?;
        self.record(AuditEvent::SigningKeyChanged {
            fingerprint: Some(key.fingerprint()),
        });
        Ok(())
    }

    /// Sign outbound credentials with the newest key again.
    pub fn clear_signing_key(&self) {
        self.keys.clear_signing_key();
        self.record(AuditEvent::SigningKeyChanged { fingerprint: None });
    }

    /// Replace the key set with the one described by `config`.
    ///
    /// Applied as a single write. On error the current keys stay in place.
    pub fn reload_keys(&self, config: &KeysConfig) -> ClusterResult<()> {
        let keys = config.resolve()?;
        let signing = config.resolve_signing()?;
        let fingerprints: Vec<String> = keys.iter().map(SharedKey::fingerprint).collect();

        self.keys.replace(keys, signing)?;

        info!(keys = fingerprints.len(), "Shared keys reloaded");
        self.record(AuditEvent::KeysReplaced { fingerprints });
        Ok(())
    }

    /// Reconcile the statically configured peers after a configuration reload.
    ///
    /// Peers dropped from the configuration leave, unless the registered
    /// descriptor no longer matches the configured one (it was re-announced
    /// by discovery since). Configured peers are joined; the local identifier
    /// is skipped with a warning.
    pub fn sync_static_peers(&self, previous: &[PeerConfig], next: &[PeerConfig]) -> StaticPeerSync {
        let mut outcome = StaticPeerSync::default();
        let configured: HashSet<&str> = next.iter().map(|p| p.identifier.as_str()).collect();

        for stale in previous
            .iter()
            .filter(|p| !configured.contains(p.identifier.as_str()))
        {
            if stale.identifier == self.self_peer.identifier() {
                continue;
            }
            match self.registry.get_by_identifier(&stale.identifier) {
                Ok(current) if *current == stale.to_peer() => {
                    if let Ok(true) = self.leave(&stale.identifier) {
                        outcome.left += 1;
                    }
                }
                Ok(_) => debug!(
                    identifier = %stale.identifier,
                    "Static peer re-registered elsewhere, keeping it"
                ),
                Err(_) => {}
            }
        }

        for peer in next {
            let peer = peer.to_peer();
            if self
                .registry
                .get_by_identifier(peer.identifier())
                .is_ok_and(|current| *current == peer)
            {
                outcome.unchanged += 1;
                continue;
            }
            let identifier = peer.identifier().to_string();
            match self.join(peer) {
                Ok(()) => outcome.joined += 1,
                Err(e) => {
                    warn!(error = %e, identifier = %identifier, "Skipping static peer");
                    outcome.skipped += 1;
                }
            }
        }

        outcome
    }

    /// Number of keys currently accepted.
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    fn guard_self(&self, identifier: &str) -> ClusterResult<()> {
        if identifier == self.self_peer.identifier() {
            return Err(ClusterError::SelfMembership {
                identifier: identifier.to_string(),
            });
        }
        Ok(())
    }

    fn record(&self, event: AuditEvent) {
        let entry = AuditEntry::now(self.self_peer.identifier(), event);
        if let Err(e) = self.audit.record(&entry) {
            warn!(error = %e, event_id = %entry.event_id, "Failed to write audit entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::NullAuditLogger;
    use std::sync::Mutex;

    const KEY: [u8; 16] = [
        0x2A, 0x9C, 0x2C, 0x3C, 0x2A, 0x9C, 0x2A, 0x9C, 0x2A, 0x9C, 0x2A, 0x9C, 0x2A, 0x9C, 0x2A,
        0x9C,
    ];

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<AuditEvent>>,
    }

    impl AuditSink for RecordingSink {
        fn record(&self, entry: &AuditEntry) -> ClusterResult<()> {
            self.events.lock().unwrap().push(entry.event.clone());
            Ok(())
        }
    }

    fn key() -> SharedKey {
        SharedKey::new(KEY.to_vec()).unwrap()
    }

    fn create_test_cluster() -> Cluster {
        Cluster::new(
            Peer::new("self", [Role::ApplicationServer], "self:8884"),
            KeyStore::new([key()]),
            Arc::new(NullAuditLogger::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_startup_misconfiguration() {
        let audit: Arc<dyn AuditSink> = Arc::new(NullAuditLogger::new());

        let result = Cluster::new(
            Peer::new("self", [Role::NetworkServer], ""),
            KeyStore::default(),
            Arc::clone(&audit),
        );
        assert!(matches!(
            result,
            Err(ClusterError::Misconfiguration {
                kind: MisconfigurationKind::NoKeys
            })
        ));

        let result = Cluster::new(
            Peer::new("self", Vec::<Role>::new(), ""),
            KeyStore::new([key()]),
            Arc::clone(&audit),
        );
        assert!(matches!(
            result,
            Err(ClusterError::Misconfiguration {
                kind: MisconfigurationKind::NoSelfRoles
            })
        ));

        let result = Cluster::new(
            Peer::new(" ", [Role::NetworkServer], ""),
            KeyStore::new([key()]),
            audit,
        );
        assert!(matches!(
            result,
            Err(ClusterError::Misconfiguration {
                kind: MisconfigurationKind::EmptyIdentifier
            })
        ));
    }

    #[test]
    fn test_self_is_addressable() {
        let cluster = create_test_cluster();
        let peers = cluster.get_peers(Role::ApplicationServer);
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].identifier(), "self");
        assert_eq!(cluster.self_peer().address(), "self:8884");
        assert_eq!(cluster.get_peer("self").unwrap().identifier(), "self");
    }

    #[test]
    fn test_join_and_leave() {
        let cluster = create_test_cluster();
        cluster
            .join(Peer::new("ns-1", [Role::NetworkServer], "ns-1:8884"))
            .unwrap();

        assert_eq!(cluster.get_peers(Role::NetworkServer).len(), 1);
        assert!(cluster.get_peers(Role::JoinServer).is_empty());
        assert_eq!(cluster.get_peer("ns-1").unwrap().address(), "ns-1:8884");
        assert!(matches!(
            cluster.get_peer("missing"),
            Err(ClusterError::NotFound { .. })
        ));

        assert!(cluster.leave("ns-1").unwrap());
        assert!(!cluster.leave("ns-1").unwrap());
        assert!(cluster.first_peer(Role::NetworkServer).is_none());
        assert_eq!(cluster.peer_count(), 1);
    }

    #[test]
    fn test_self_membership_protected() {
        let cluster = create_test_cluster();
        assert!(matches!(
            cluster.join(Peer::new("self", [Role::JoinServer], "elsewhere")),
            Err(ClusterError::SelfMembership { .. })
        ));
        assert!(matches!(
            cluster.leave("self"),
            Err(ClusterError::SelfMembership { .. })
        ));
        assert!(cluster.get_peers(Role::JoinServer).is_empty());
        assert_eq!(cluster.self_peer().address(), "self:8884");
    }

    #[test]
    fn test_verify_source() {
        let cluster = create_test_cluster();

        assert!(!cluster.verify_source(&RequestMetadata::new()));

        let md: RequestMetadata = [(AUTHORIZATION, "ClusterKey 2a9c2c3c2a9c2a9c2a9c2a9c2a9c2a9c")]
            .into_iter()
            .collect();
        assert!(cluster.verify_source(&md));

        let md: RequestMetadata = [(AUTHORIZATION, "Basic invalid-secret")].into_iter().collect();
        assert!(!cluster.verify_source(&md));
    }

    #[test]
    fn test_outgoing_metadata_verifies() {
        let cluster = create_test_cluster();
        let md = cluster.outgoing_metadata().unwrap();
        assert_eq!(md.get_single(PEER_IDENTIFIER), Some("self"));
        assert_eq!(
            md.get_single(AUTHORIZATION),
            Some("ClusterKey 2a9c2c3c2a9c2a9c2a9c2a9c2a9c2a9c")
        );
        assert!(cluster.verify_source(&md));
    }

    #[test]
    fn test_outbound_credential_uses_newest_key() {
        let cluster = create_test_cluster();
        let k2 = SharedKey::new(vec![7u8; 16]).unwrap();
        assert!(cluster.add_key(k2.clone()));
        assert_eq!(
            cluster.new_cluster_credential().unwrap(),
            Credential::from_key(&k2)
        );

        cluster.set_signing_key(&key()).unwrap();
        assert_eq!(
            cluster.new_cluster_credential().unwrap(),
            Credential::from_key(&key())
        );
    }

    #[test]
    fn test_no_signing_key_after_removing_all() {
        let cluster = create_test_cluster();
        assert!(cluster.remove_key(&key()));
        assert_eq!(cluster.key_count(), 0);
        assert!(matches!(
            cluster.new_cluster_credential(),
            Err(ClusterError::NoSigningKey)
        ));
    }

    #[test]
    fn test_changes_are_audited() {
        let sink = Arc::new(RecordingSink::default());
        let cluster = Cluster::new(
            Peer::new("self", [Role::ApplicationServer], ""),
            KeyStore::new([key()]),
            Arc::clone(&sink) as Arc<dyn AuditSink>,
        )
        .unwrap();

        cluster
            .join(Peer::new("js-1", [Role::JoinServer], "js-1:1"))
            .unwrap();
        cluster
            .join(Peer::new("js-1", [Role::JoinServer], "js-1:2"))
            .unwrap();
        cluster.leave("js-1").unwrap();
        cluster.leave("js-1").unwrap();
        let k2 = SharedKey::new(vec![9u8; 8]).unwrap();
        cluster.add_key(k2.clone());
        cluster.add_key(k2.clone());
        cluster.remove_key(&key());

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 5);
        assert!(matches!(
            &events[0],
            AuditEvent::PeerJoined { replaced: false, .. }
        ));
        assert!(matches!(
            &events[1],
            AuditEvent::PeerJoined { replaced: true, address, .. } if address == "js-1:2"
        ));
        assert!(matches!(&events[2], AuditEvent::PeerLeft { .. }));
        assert_eq!(
            events[3],
            AuditEvent::KeyAdded {
                fingerprint: k2.fingerprint()
            }
        );
        assert!(matches!(
            &events[4],
            AuditEvent::KeyRemoved { remaining: 1, .. }
        ));
    }

    fn static_peer(identifier: &str, roles: &[Role], address: &str) -> PeerConfig {
        PeerConfig {
            identifier: identifier.to_string(),
            roles: roles.to_vec(),
            address: address.to_string(),
        }
    }

    #[test]
    fn test_sync_static_peers_removes_stale_and_updates_roles() {
        let cluster = create_test_cluster();
        let previous = vec![
            static_peer("ns-1", &[Role::NetworkServer], "ns-1:8884"),
            static_peer("js-1", &[Role::JoinServer], "js-1:8884"),
        ];
        let outcome = cluster.sync_static_peers(&[], &previous);
        assert_eq!(outcome.joined, 2);

        let next = vec![static_peer(
            "ns-1",
            &[Role::NetworkServer, Role::GatewayServer],
            "ns-1:8884",
        )];
        let outcome = cluster.sync_static_peers(&previous, &next);
        assert_eq!(
            outcome,
            StaticPeerSync {
                joined: 1,
                unchanged: 0,
                left: 1,
                skipped: 0,
            }
        );
        assert!(matches!(
            cluster.get_peer("js-1"),
            Err(ClusterError::NotFound { .. })
        ));
        assert_eq!(cluster.get_peers(Role::GatewayServer).len(), 1);

        // Same configuration again is a no-op
        let outcome = cluster.sync_static_peers(&next, &next);
        assert_eq!(outcome.unchanged, 1);
        assert_eq!(outcome.joined + outcome.left, 0);
    }

    #[test]
    fn test_sync_static_peers_skips_self() {
        let cluster = create_test_cluster();
        let next = vec![
            static_peer("self", &[Role::JoinServer], "elsewhere"),
            static_peer("ns-1", &[Role::NetworkServer], "ns-1:8884"),
        ];
        let outcome = cluster.sync_static_peers(&[], &next);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.joined, 1);
        assert_eq!(cluster.self_peer().address(), "self:8884");
        assert!(cluster.get_peers(Role::JoinServer).is_empty());

        // Dropping the self entry again never removes the local peer
        let outcome = cluster.sync_static_peers(&next, &next[1..]);
        assert_eq!(outcome.left, 0);
        assert!(cluster.get_peer("self").is_ok());
    }

    #[test]
    fn test_sync_static_peers_keeps_rediscovered_peer() {
        let cluster = create_test_cluster();
        let previous = vec![static_peer("gs-1", &[Role::GatewayServer], "gs-1:1700")];
        cluster.sync_static_peers(&[], &previous);

        // Discovery re-announces the peer with a new address
        cluster
            .join(Peer::new("gs-1", [Role::GatewayServer], "gs-1b:1700"))
            .unwrap();

        let outcome = cluster.sync_static_peers(&previous, &[]);
        assert_eq!(outcome.left, 0);
        assert_eq!(cluster.get_peer("gs-1").unwrap().address(), "gs-1b:1700");
    }

    #[test]
    fn test_reload_keys() {
        let cluster = create_test_cluster();
        let config = KeysConfig {
            secrets: vec!["0102030405060708".to_string(), hex::encode(KEY)],
            secret_files: Vec::new(),
            signing: None,
        };
        cluster.reload_keys(&config).unwrap();
        assert_eq!(cluster.key_count(), 2);
        assert_eq!(
            cluster.new_cluster_credential().unwrap().to_string(),
            format!("ClusterKey {}", hex::encode(KEY))
        );

        let broken = KeysConfig {
            secrets: vec!["zz".to_string()],
            secret_files: Vec::new(),
            signing: None,
        };
        assert!(cluster.reload_keys(&broken).is_err());
        assert_eq!(cluster.key_count(), 2);
    }
}
