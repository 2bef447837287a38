//! Audit logger for writing audit entries to file.
//!
//! Writes structured audit entries as JSON lines (one JSON object per line)
//! for easy parsing by log analysis tools.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::error::ClusterResult;

use super::entry::AuditEntry;

/// Destination for audit entries.
///
/// The sink is the only I/O collaborator of the cluster core. It is called
/// synchronously on the mutating thread for every membership or key change,
/// never on lookups or source verification. Implementations that cannot
/// afford a blocking write there should hand the entry off to a background
/// writer.
pub trait AuditSink: Send + Sync {
    /// Record an entry.
    fn record(&self, entry: &AuditEntry) -> ClusterResult<()>;
}

/// Logger for audit entries.
///
/// Writes audit entries to a file in JSON lines format.
/// Thread-safe via internal mutex.
pub struct AuditLogger {
    /// The file handle wrapped in a mutex for thread safety.
    file: Mutex<File>,
    /// Path to the audit log file.
    path: PathBuf,
}

impl AuditLogger {
    /// Create a new audit logger that writes to the specified path.
    ///
    /// Creates the parent directory if it doesn't exist.
    /// Opens the file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Parent directory cannot be created
    /// - File cannot be opened for appending
    pub fn new(path: &Path) -> ClusterResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                debug!(path = %parent.display(), "Creating audit log directory");
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        debug!(path = %path.display(), "Audit logger initialized");

        Ok(Self {
            file: Mutex::new(file),
            path: path.to_path_buf(),
        })
    }

    /// Get the path to the audit log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for AuditLogger {
    /// Serializes the entry to JSON and writes it as a single line.
    /// Syncs the file after writing for durability.
    fn record(&self, entry: &AuditEntry) -> ClusterResult<()> {
        let json = serde_json::to_string(entry)?;

        let mut file = match self.file.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(), // Recover from mutex poisoning
        };

        writeln!(file, "{}", json)?;

        if let Err(e) = file.sync_data() {
            warn!(error = %e, "Failed to sync audit log");
        }

        debug!(event_id = %entry.event_id, "Audit entry logged");

        Ok(())
    }
}

/// A no-op audit logger for testing or when audit logging is disabled.
#[derive(Debug, Default)]
pub struct NullAuditLogger;

impl NullAuditLogger {
    pub fn new() -> Self {
        Self
    }
}

impl AuditSink for NullAuditLogger {
    fn record(&self, _entry: &AuditEntry) -> ClusterResult<()> {
        Ok(())
    }
}
