//! Request metadata.
//!
//! Models the key/value metadata the transport attaches to every request.
//! Keys are ASCII case-insensitive and may carry several values.

mod map;

pub use map::RequestMetadata;

/// Metadata key carrying the cluster credential.
pub const AUTHORIZATION: &str = "authorization";

/// Metadata key carrying the identifier of the calling peer.
pub const PEER_IDENTIFIER: &str = "cluster-peer";
