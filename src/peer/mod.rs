//! Cluster member descriptors.

mod descriptor;
mod role;

pub use descriptor::Peer;
pub use role::Role;
