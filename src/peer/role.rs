//! Service roles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ClusterError;

/// Kind of service a peer provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    IdentityServer,
    GatewayServer,
    NetworkServer,
    ApplicationServer,
    JoinServer,
    GatewayBridge,
    CryptoServer,
}

impl Role {
    /// All known roles.
    pub const ALL: [Role; 7] = [
        Role::IdentityServer,
        Role::GatewayServer,
        Role::NetworkServer,
        Role::ApplicationServer,
        Role::JoinServer,
        Role::GatewayBridge,
        Role::CryptoServer,
    ];

    /// The kebab-case name used in configuration and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::IdentityServer => "identity-server",
            Role::GatewayServer => "gateway-server",
            Role::NetworkServer => "network-server",
            Role::ApplicationServer => "application-server",
            Role::JoinServer => "join-server",
            Role::GatewayBridge => "gateway-bridge",
            Role::CryptoServer => "crypto-server",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .iter()
            .copied()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| ClusterError::Config {
                message: format!("Unknown role '{}'", s),
            })
    }
}
