//! Loading shared keys from secret files.

use std::path::Path;

use crate::error::{ClusterError, ClusterResult, MisconfigurationKind};

use super::SharedKey;

fn key_file_error(message: String) -> ClusterError {
    ClusterError::misconfigured(MisconfigurationKind::KeyFile { message })
}

/// Load a shared key from a file.
///
/// Security: Verifies the file has restrictive permissions (0600 or 0400)
/// before loading to prevent secrets from being readable by other users.
///
/// A text file is trimmed; hex content is decoded, anything else is used as
/// the key text. Non-UTF-8 files are used verbatim. A file that is empty or
/// whitespace only is rejected.
pub fn load_key_file(path: &Path) -> ClusterResult<SharedKey> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        key_file_error(format!(
            "Failed to read key file metadata from {}: {}",
            path.display(),
            e
        ))
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = metadata.permissions().mode();
        // Group and world bits must all be zero
        if mode & 0o077 != 0 {
            return Err(key_file_error(format!(
                "Key file {} has insecure permissions {:04o}, expected 0600 or 0400",
                path.display(),
                mode & 0o777
            )));
        }
    }
    #[cfg(not(unix))]
    let _ = metadata;

    let raw = std::fs::read(path).map_err(|e| {
        key_file_error(format!("Failed to read key file {}: {}", path.display(), e))
    })?;

    let bytes = match std::str::from_utf8(&raw).map(str::trim) {
        Ok("") => {
            return Err(key_file_error(format!("Key file {} is empty", path.display())));
        }
        Ok(text) => hex::decode(text).unwrap_or_else(|_| text.as_bytes().to_vec()),
        Err(_) => raw.clone(),
    };

    SharedKey::new(bytes)
}
