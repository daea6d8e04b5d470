//! JSON-file persistence shared by the engagement store and the alerted set.

use serde::{de::DeserializeOwned, Serialize};
use shared_models::error::{ModelError, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Loads `path`, treating a missing or unreadable file as empty state.
pub fn load_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "State file absent, starting empty");
            return T::default();
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "State file unreadable, starting empty");
            return T::default();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "State file corrupt, starting empty");
            T::default()
        }
    }
}

/// Writes `value` to a sibling temp file and renames it over `path`, so a
/// crash mid-write never leaves a truncated state file behind.
pub fn write_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let body = serde_json::to_vec_pretty(value)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp);

    fs::write(&tmp, body)
        .map_err(|e| ModelError::Storage(format!("Failed to write {}: {}", tmp.display(), e)))?;
    fs::rename(&tmp, path)
        .map_err(|e| ModelError::Storage(format!("Failed to replace {}: {}", path.display(), e)))?;
    Ok(())
}
