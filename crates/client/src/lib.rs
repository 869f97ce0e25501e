// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Typed client for the task metadata server.
//!
//! The scheduler's only view of the server is the [`ServerClient`] trait.
//! All calls may fail transiently; callers log and skip, so a server
//! error never propagates past a single housekeeping job or agent
//! evaluation.
//!
//! The zero-commit auto-reject rule lives here (as a default trait
//! method) rather than in the engine, so every transport (HTTP or the
//! in-memory fake) enforces the same resubmission policy.

pub mod http;
pub mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use http::HttpServerClient;
pub use types::{
    ActionRecord, ClaimParams, NewTask, OrchestratorInfo, PollData, ProjectStatus, SubmitOutcome,
    TaskPatch,
};

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeServer;

use fm_core::{OrchestratorId, Queue, Task, TaskId};
use thiserror::Error;

/// Errors from server calls
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("task not found: {0}")]
    NotFound(TaskId),
    #[error("task {id} is in queue {queue}, expected {expected}")]
    WrongQueue { id: TaskId, queue: Queue, expected: Queue },
}

/// The task-server contract, one method per server operation.
pub trait ServerClient {
    fn list_tasks(&self, queue: Option<Queue>) -> Result<Vec<Task>, ClientError>;

    fn get_task(&self, id: &TaskId) -> Result<Option<Task>, ClientError>;

    fn create_task(&self, new_task: &NewTask) -> Result<Task, ClientError>;

    /// Update arbitrary fields. The patch type deliberately has no queue
    /// field; queue moves go through [`ServerClient::update_queue`].
    fn update_task(&self, id: &TaskId, patch: &TaskPatch) -> Result<(), ClientError>;

    fn update_queue(&self, id: &TaskId, queue: Queue, patch: &TaskPatch)
        -> Result<(), ClientError>;

    /// Atomically claim one non-blocked incoming task matching the role
    /// filter. Returns `None` when nothing is claimable.
    fn claim_task(&self, params: &ClaimParams<'_>) -> Result<Option<Task>, ClientError>;

    /// Transport-level `claimed → provisional` move. Engine code calls
    /// [`ServerClient::submit_task`] instead, which applies the
    /// zero-commit auto-reject rule first.
    fn submit_raw(&self, id: &TaskId, commits_count: u32, turns_used: u32)
        -> Result<(), ClientError>;

    /// Move to `done`; the server unblocks dependents whose prerequisites
    /// are all done.
    fn accept_task(&self, id: &TaskId, accepted_by: &str) -> Result<(), ClientError>;

    /// Move back to `incoming`; clears the claim and increments
    /// `attempt_count`.
    fn reject_task(
        &self,
        id: &TaskId,
        reason: &str,
        feedback: Option<&str>,
    ) -> Result<(), ClientError>;

    /// Upsert this orchestrator; idempotent.
    fn register_orchestrator(&self, info: &OrchestratorInfo) -> Result<(), ClientError>;

    fn heartbeat(&self, id: &OrchestratorId) -> Result<(), ClientError>;

    fn list_actions(&self, status: &str) -> Result<Vec<ActionRecord>, ClientError>;

    fn complete_action(&self, id: &str, result: &serde_json::Value) -> Result<(), ClientError>;

    fn fail_action(&self, id: &str, error: &str) -> Result<(), ClientError>;

    /// Batched read shared by all remote housekeeping jobs in a tick.
    fn poll(&self) -> Result<PollData, ClientError>;

    /// Submit a completion, auto-rejecting zero-commit resubmissions.
    ///
    /// A submission with no commits from a task that has already been
    /// rejected (attempt or review history) goes straight back to
    /// `incoming` as `reject(reason="no_commits")` instead of parking in
    /// `provisional`. On the third such resubmission the rejection
    /// banner is set so the next worker sees the history.
    fn submit_task(
        &self,
        id: &TaskId,
        commits_count: u32,
        turns_used: u32,
    ) -> Result<SubmitOutcome, ClientError> {
        if commits_count == 0 {
            let task = self.get_task(id)?.ok_or_else(|| ClientError::NotFound(id.clone()))?;
            if task.attempt_count > 0 || task.rejection_count > 0 {
                if task.attempt_count >= 2 {
                    let banner = format!(
                        "{} zero-commit submissions so far; see task history before starting",
                        task.attempt_count + 1
                    );
                    self.update_task(id, &TaskPatch::new().rejection_banner(banner))?;
                }
                self.reject_task(id, "no_commits", None)?;
                return Ok(SubmitOutcome::AutoRejected);
            }
        }
        self.submit_raw(id, commits_count, turns_used)?;
        Ok(SubmitOutcome::Submitted)
    }
}
