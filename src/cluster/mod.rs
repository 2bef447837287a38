//! Cluster composition root.
//!
//! Owns the local peer identity, the peer registry and the shared keys,
//! and exposes the narrow set of operations the rest of the platform uses
//! to locate peers and authenticate internal calls.

mod node;

pub use node::{Cluster, StaticPeerSync};
