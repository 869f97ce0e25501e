// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Declarative configuration for the scheduler.
//!
//! Three YAML files drive a foreman deployment: the flow definition (the
//! task state machine), the agents file (worker blueprints), and the jobs
//! file (housekeeping). Malformed configuration is fatal at load time;
//! the tick refuses to run rather than guess.

pub mod agents;
pub mod flow;
pub mod jobs;

pub use agents::load_agents;
pub use flow::{load_flow, FlowDef, TransitionDef};
pub use jobs::{load_jobs, JobDef, JobGroup, JobType};

use std::path::PathBuf;
use thiserror::Error;

/// Errors from loading and validating configuration files
#[derive(Debug, Error)]
pub enum PlaybookError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("flow {flow:?} references unknown queue {queue:?}")]
    UnknownQueue { flow: String, queue: String },
    #[error("flow {flow:?} declares no states")]
    EmptyFlow { flow: String },
}
