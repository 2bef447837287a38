//! Peer registry.
//!
//! In-memory catalog of known cluster members, indexed by identifier and
//! by role.

mod peer_registry;

pub use peer_registry::PeerRegistry;
