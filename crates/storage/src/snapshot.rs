// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Atomic JSON snapshots.
//!
//! State files are written to a temporary sibling and renamed into place,
//! so a reader (or a crashed writer) never observes a half-written file.

use crate::StorageError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Read a JSON snapshot. Returns `Ok(None)` when the file does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StorageError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_str(&raw)?))
}

/// Read a JSON snapshot, falling back to the default on a missing or
/// corrupt file. Corruption is logged, not propagated; the snapshot will
/// be rewritten wholesale on the next save.
pub fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    match read_json(path) {
        Ok(Some(value)) => value,
        Ok(None) => T::default(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "unreadable snapshot, starting fresh");
            T::default()
        }
    }
}

/// Write a JSON snapshot atomically (temp sibling + rename).
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;

    let file_name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    let tmp = parent.join(format!(".{}.tmp-{}", file_name, std::process::id()));

    let raw = serde_json::to_string_pretty(value)?;
    if let Err(source) = std::fs::write(&tmp, raw) {
        return Err(StorageError::Write { path: tmp, source });
    }
    if let Err(source) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(StorageError::Write { path: path.to_path_buf(), source });
    }
    Ok(())
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
