// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Persistence primitives for the scheduler.
//!
//! Everything the scheduler writes to disk funnels through this crate:
//! advisory file locks, atomic JSON snapshots, the per-blueprint PID
//! registry with its audit trail, and the housekeeping-job ledger.

pub mod layout;
pub mod ledger;
pub mod lock;
pub mod pool;
pub mod process;
pub mod snapshot;

pub use layout::RuntimeDir;
pub use ledger::SchedulerLedger;
pub use lock::LockGuard;
pub use pool::{PidEntry, PoolRegistry};

use std::path::PathBuf;
use thiserror::Error;

/// Errors from storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
