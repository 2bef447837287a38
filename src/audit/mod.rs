//! Audit logging module.
//!
//! Records every membership change and key rotation as a structured entry.
//! Logs are written in JSON lines format for easy parsing by log analysis tools.
//!
//! Keys never appear in entries, only their fingerprints.

mod entry;
mod logger;

pub use entry::{AuditEntry, AuditEvent};
pub use logger::{AuditLogger, AuditSink, NullAuditLogger};
