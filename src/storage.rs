//! Atomic JSON file persistence for the schedule and instance stores.
//!
//! `save_json` writes a sibling temporary file and renames it into place, so
//! a reader observes either the previous content or the new content in full,
//! never a prefix.

use crate::error::{InkframeError, InkframeResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Ensure a directory exists, creating it and its parents if necessary.
pub fn ensure_dir(path: &Path) -> InkframeResult<PathBuf> {
    fs::create_dir_all(path).map_err(|e| {
        InkframeError::StorePersistence(format!("Failed to create {}: {}", path.display(), e))
    })?;
    Ok(path.to_path_buf())
}

/// Load a JSON file. A missing or malformed file yields `None`, never an error.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    if !path.exists() {
        return None;
    }

    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", path.display(), e);
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Malformed JSON in {}: {}", path.display(), e);
            None
        }
    }
}

/// Serialize `value` to `path` atomically (temp file + rename).
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> InkframeResult<()> {
    let raw = serde_json::to_vec_pretty(value)
        .map_err(|e| InkframeError::StorePersistence(format!("Serialization error: {}", e)))?;

    let tmp = tmp_path(path);
    fs::write(&tmp, &raw).map_err(|e| {
        InkframeError::StorePersistence(format!("Failed to write {}: {}", tmp.display(), e))
    })?;

    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        InkframeError::StorePersistence(format!("Failed to replace {}: {}", path.display(), e))
    })
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
