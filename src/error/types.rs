//! Error types for the cluster core.

use thiserror::Error;

/// Main error type for the cluster core.
#[derive(Error, Debug)]
pub enum ClusterError {
    /// Configuration-related errors.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Fatal startup conditions. The instance must refuse to start.
    #[error("Misconfiguration: {kind}")]
    Misconfiguration { kind: MisconfigurationKind },

    /// Peer lookup by identifier found nothing.
    #[error("Peer not found: {identifier}")]
    NotFound { identifier: String },

    /// The local peer cannot be replaced or removed through membership changes.
    #[error("Refusing to change membership of the local peer '{identifier}'")]
    SelfMembership { identifier: String },

    /// An outbound credential was requested but no key is available.
    #[error("No signing key available")]
    NoSigningKey,

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Misconfiguration kinds.
#[derive(Error, Debug)]
pub enum MisconfigurationKind {
    #[error("no shared keys configured, peers cannot be authenticated")]
    NoKeys,

    #[error("local peer declares no roles")]
    NoSelfRoles,

    #[error("local peer identifier is empty")]
    EmptyIdentifier,

    #[error("invalid shared key: {message}")]
    InvalidKey { message: String },

    #[error("designated signing key is not one of the configured keys")]
    UnknownSigningKey,

    #[error("failed to load key file: {message}")]
    KeyFile { message: String },
}

impl ClusterError {
    /// Shorthand for a misconfiguration error.
    pub fn misconfigured(kind: MisconfigurationKind) -> Self {
        Self::Misconfiguration { kind }
    }
}

/// Result type alias for cluster operations.
pub type ClusterResult<T> = Result<T, ClusterError>;
