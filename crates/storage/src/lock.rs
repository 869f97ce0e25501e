// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Advisory file locks.
//!
//! Non-blocking exclusive locks on lock files. A held lock is released
//! when the guard drops (or the process exits, which is what makes these
//! safe across scheduler crashes).

use crate::StorageError;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

/// A held advisory lock. Dropping the guard releases the lock.
#[derive(Debug)]
pub struct LockGuard {
    file: File,
}

impl LockGuard {
    /// Try to acquire an exclusive lock on `path` without blocking.
    ///
    /// Returns `Ok(None)` when another process holds the lock. The file
    /// is opened without truncation so an existing holder's PID is not
    /// wiped before we actually own the lock.
    pub fn try_acquire(path: &Path) -> Result<Option<LockGuard>, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().write(true).create(true).truncate(false).open(path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(LockGuard { file })),
            Err(_) => Ok(None),
        }
    }

    /// Record the holder's PID in the lock file (truncating now that the
    /// lock is held).
    pub fn write_pid(&mut self) -> Result<(), StorageError> {
        self.file.set_len(0)?;
        writeln!(self.file, "{}", std::process::id())?;
        Ok(())
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
