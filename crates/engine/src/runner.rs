// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step runner with the per-task retry counter.
//!
//! A transition's steps run in declared order. The task directory holds
//! a small `step_failure_count` file: the first two failures re-raise
//! (the PID is retained so the next sweep retries, and the lease monitor
//! eventually resurfaces the task); the third moves the task to `failed`
//! and returns cleanly so the PID is released. A fully successful run
//! deletes the counter so stale counts never survive into unrelated
//! work on the same task directory.

use crate::scheduler::Scheduler;
use crate::steps::{self, StepContext};
use crate::tools::WorkTools;
use crate::EngineError;
use fm_client::{ServerClient, TaskPatch};
use fm_core::{Clock, Queue, ResultArtifact, Task};
use fm_playbook::TransitionDef;
use std::path::Path;

/// How many step failures are tolerated before giving up (the third
/// failure moves the task to `failed`).
const MAX_STEP_FAILURES: u32 = 2;

/// Outcome of running a transition's steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepsOutcome {
    /// Every step succeeded; the engine may finalize the transition.
    Completed,
    /// Third failure: the task was moved to `failed` and the caller
    /// should release the PID.
    GaveUp,
}

pub(crate) fn read_failure_count(path: &Path) -> u32 {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(0)
}

fn write_failure_count(path: &Path, count: u32) {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Err(e) = std::fs::write(path, count.to_string()) {
        tracing::warn!(path = %path.display(), error = %e, "cannot write step failure counter");
    }
}

fn clear_failure_count(path: &Path) {
    if path.exists() {
        let _ = std::fs::remove_file(path);
    }
}

/// Execute a transition's steps for a task.
pub fn run_transition_steps<C: Clock, S: ServerClient, T: WorkTools>(
    s: &Scheduler<C, S, T>,
    task: &mut Task,
    artifact: &ResultArtifact,
    transition: &TransitionDef,
) -> Result<StepsOutcome, EngineError> {
    let counter_path = s.runtime.step_failure_count(&task.id);
    let task_dir = s.runtime.task_dir(&task.id);
    let worktree = s.runtime.task_worktree(&task.id);
    let task_id = task.id.clone();

    for name in &transition.steps {
        let Some(step) = steps::lookup(name) else {
            return Err(EngineError::UnknownStep {
                flow: String::new(),
                step: name.clone(),
            });
        };

        let mut ctx = StepContext {
            task,
            artifact,
            task_dir: task_dir.clone(),
            worktree: worktree.clone(),
            client: &s.client,
            tools: &s.tools,
            test_command: s.config.test_command.as_deref(),
        };

        if let Err(step_err) = step(&mut ctx) {
            let failures = read_failure_count(&counter_path);
            if failures >= MAX_STEP_FAILURES {
                tracing::warn!(
                    task_id = %task_id,
                    step = %name,
                    failures,
                    error = %step_err,
                    "step failed for the third time, moving task to failed"
                );
                s.client.update_queue(&task_id, Queue::Failed, &TaskPatch::new())?;
                clear_failure_count(&counter_path);
                return Ok(StepsOutcome::GaveUp);
            }
            write_failure_count(&counter_path, failures + 1);
            tracing::warn!(
                task_id = %task_id,
                step = %name,
                failures = failures + 1,
                error = %step_err,
                "step failed, will retry on a later sweep"
            );
            return Err(step_err.into());
        }
    }

    clear_failure_count(&counter_path);
    Ok(StepsOutcome::Completed)
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
