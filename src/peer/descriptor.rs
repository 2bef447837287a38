//! Peer descriptor.

use std::collections::BTreeSet;

use super::Role;

/// A single member of the cluster.
///
/// Immutable once constructed. A changed role set is expressed by
/// registering a new descriptor under the same identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    identifier: String,
    roles: BTreeSet<Role>,
    address: String,
}

impl Peer {
    /// Create a new peer descriptor.
    pub fn new(
        identifier: impl Into<String>,
        roles: impl IntoIterator<Item = Role>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            roles: roles.into_iter().collect(),
            address: address.into(),
        }
    }

    /// Unique identifier of the peer within the cluster.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Roles served by the peer, in a stable order.
    pub fn roles(&self) -> &BTreeSet<Role> {
        &self.roles
    }

    /// Opaque connection target.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}
