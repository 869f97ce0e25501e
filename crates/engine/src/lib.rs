// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! The scheduler engine.
//!
//! One [`Scheduler`] instance owns the injected clock, server client, and
//! work tools, and drives the periodic tick: finish sweep, agent
//! evaluation, housekeeping. Everything here is sequential; the only
//! concurrency in the system is the OS boundary between the scheduler
//! and its detached worker processes.

pub mod actions;
pub mod guards;
pub mod housekeeping;
pub mod jobs;
pub mod lease;
pub mod results;
pub mod runner;
pub mod scheduler;
pub mod shell;
pub mod spawn;
pub mod steps;
pub mod sweep;
pub mod tick;
pub mod tools;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use scheduler::{verify_install_path, ConfigDir, Scheduler, SchedulerConfig, SchedulerDeps};
pub use steps::StepError;
pub use tick::{run_tick, TickOutcome};
pub use tools::{MergeState, PrInfo, ShellTools, WorkTools};

#[cfg(any(test, feature = "test-support"))]
pub use tools::fake::FakeTools;

use thiserror::Error;

/// Errors from engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] fm_storage::StorageError),
    #[error("config error: {0}")]
    Playbook(#[from] fm_playbook::PlaybookError),
    #[error("server error: {0}")]
    Client(#[from] fm_client::ClientError),
    #[error("step failed: {0}")]
    Step(#[from] steps::StepError),
    #[error("tool error: {0}")]
    Tool(#[from] tools::ToolError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("flow {flow:?} references unknown step {step:?}")]
    UnknownStep { flow: String, step: String },
    #[error("scheduler binary is installed inside an agent worktree: {0}")]
    InstallPath(String),
}
