//! Configuration settings for the cluster core.

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::audit::{AuditLogger, AuditSink, NullAuditLogger};
use crate::auth::{load_key_file, SharedKey};
use crate::error::{ClusterError, ClusterResult};
use crate::peer::{Peer, Role};

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub node: NodeConfig,
    pub keys: KeysConfig,
    #[serde(default)]
    pub peers: Vec<PeerConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

/// Identity of the local instance.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// Identifier, unique within the cluster.
    pub identifier: String,
    /// Roles served by this instance.
    pub roles: Vec<Role>,
    /// Address other members use to reach this instance.
    #[serde(default)]
    pub address: String,
}

/// Shared key material.
#[derive(Clone, Default, Deserialize)]
pub struct KeysConfig {
    /// Hex-encoded keys, oldest first.
    #[serde(default)]
    pub secrets: Vec<String>,
    /// Files holding one key each, appended after `secrets`.
    #[serde(default)]
    pub secret_files: Vec<PathBuf>,
    /// Hex of the key designated for outbound credentials.
    /// When absent the newest key signs.
    pub signing: Option<String>,
}

/// A statically configured peer.
#[derive(Debug, Clone, Deserialize)]
pub struct PeerConfig {
    pub identifier: String,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub address: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format ("pretty" or "json").
    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Audit logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// Whether audit logging is enabled.
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    /// Path to the audit log file.
    #[serde(default = "default_audit_log_path")]
    pub log_path: PathBuf,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_audit_enabled() -> bool {
    false
}

fn default_audit_log_path() -> PathBuf {
    PathBuf::from("/var/log/netstack/cluster-audit.log")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            log_path: default_audit_log_path(),
        }
    }
}

impl AuditConfig {
    /// Open the configured audit destination.
    pub fn open_sink(&self) -> ClusterResult<Arc<dyn AuditSink>> {
        if self.enabled {
            Ok(Arc::new(AuditLogger::new(&self.log_path)?))
        } else {
            Ok(Arc::new(NullAuditLogger::new()))
        }
    }
}

impl NodeConfig {
    /// Descriptor of the local peer.
    pub fn to_peer(&self) -> Peer {
        Peer::new(
            self.identifier.clone(),
            self.roles.iter().copied(),
            self.address.clone(),
        )
    }
}

impl PeerConfig {
    pub fn to_peer(&self) -> Peer {
        Peer::new(
            self.identifier.clone(),
            self.roles.iter().copied(),
            self.address.clone(),
        )
    }
}

impl fmt::Debug for KeysConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeysConfig")
            .field("secrets", &format_args!("[REDACTED; {}]", self.secrets.len()))
            .field("secret_files", &self.secret_files)
            .field("signing", &self.signing.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl KeysConfig {
    /// Decode inline secrets and read secret files, in that order.
    pub fn resolve(&self) -> ClusterResult<Vec<SharedKey>> {
        let mut keys = Vec::with_capacity(self.secrets.len() + self.secret_files.len());
        for secret in &self.secrets {
            keys.push(SharedKey::from_hex(secret)?);
        }
        for path in &self.secret_files {
            keys.push(load_key_file(path)?);
        }
        Ok(keys)
    }

    /// The designated signing key, if configured.
    pub fn resolve_signing(&self) -> ClusterResult<Option<SharedKey>> {
        self.signing.as_deref().map(SharedKey::from_hex).transpose()
    }
}

impl Settings {
    /// Load settings from a TOML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> ClusterResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ClusterError::Config {
            message: format!("Failed to read config file '{}': {}", path.display(), e),
        })?;

        Self::from_toml_str(&content).map_err(|e| match e {
            ClusterError::Config { message } => ClusterError::Config {
                message: format!("{} ({})", message, path.display()),
            },
            other => other,
        })
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml_str(content: &str) -> ClusterResult<Self> {
        let settings: Settings = toml::from_str(content).map_err(|e| ClusterError::Config {
            message: format!("Failed to parse config: {}", e),
        })?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate the settings.
    fn validate(&self) -> ClusterResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ClusterError::Config {
                message: format!(
                    "Invalid log level '{}'. Valid levels: {:?}",
                    self.logging.level, valid_levels
                ),
            });
        }

        let valid_formats = ["pretty", "json"];
        if !valid_formats.contains(&self.logging.format.to_lowercase().as_str()) {
            return Err(ClusterError::Config {
                message: format!(
                    "Invalid log format '{}'. Valid formats: {:?}",
                    self.logging.format, valid_formats
                ),
            });
        }

        if self.node.identifier.trim().is_empty() {
            return Err(ClusterError::Config {
                message: "node.identifier must not be empty".to_string(),
            });
        }

        if self.node.roles.is_empty() {
            return Err(ClusterError::Config {
                message: format!("node '{}' declares no roles", self.node.identifier),
            });
        }

        if self.keys.secrets.is_empty() && self.keys.secret_files.is_empty() {
            return Err(ClusterError::Config {
                message: "at least one entry in keys.secrets or keys.secret_files is required"
                    .to_string(),
            });
        }

        if let Some(peer) = self.peers.iter().find(|p| p.identifier.trim().is_empty()) {
            return Err(ClusterError::Config {
                message: format!("static peer at '{}' has an empty identifier", peer.address),
            });
        }

        Ok(())
    }
}
