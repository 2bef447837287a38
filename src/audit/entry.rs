//! Audit entry types.
//!
//! Defines the structure of audit log entries.

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::peer::Role;

/// A single audit log entry.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    /// RFC 3339 timestamp of the change.
    pub timestamp: String,
    /// Unique identifier for the entry.
    pub event_id: Uuid,
    /// Identifier of the local peer that applied the change.
    pub node: String,
    /// What changed.
    pub event: AuditEvent,
}

impl AuditEntry {
    /// Create an entry stamped with the current time.
    pub fn now(node: impl Into<String>, event: AuditEvent) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            event_id: Uuid::new_v4(),
            node: node.into(),
            event,
        }
    }
}

/// Membership and key events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    PeerJoined {
        identifier: String,
        roles: Vec<Role>,
        address: String,
        replaced: bool,
    },
    PeerLeft {
        identifier: String,
    },
    KeyAdded {
        fingerprint: String,
    },
    KeyRemoved {
        fingerprint: String,
        remaining: usize,
    },
    KeysReplaced {
        fingerprints: Vec<String>,
    },
    SigningKeyChanged {
        /// `None` when signing falls back to the newest key.
        #[serde(skip_serializing_if = "Option::is_none")]
        fingerprint: Option<String>,
    },
}
