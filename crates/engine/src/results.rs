// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Result handling: artifact → flow transition → server call.
//!
//! Idempotent by construction: late and duplicate deliveries are no-ops,
//! and the final queue move is only issued when the refetched task has
//! not already reached the target.

use crate::runner::{run_transition_steps, StepsOutcome};
use crate::scheduler::Scheduler;
use crate::tools::WorkTools;
use crate::EngineError;
use fm_client::{ServerClient, TaskPatch};
use fm_core::{Clock, Queue, ResultArtifact, Task, TaskId};
use fm_playbook::TransitionDef;

/// Rebase instructions appended to rejection feedback when the reviewer
/// did not already include them.
pub fn rebase_instructions(base_branch: &str) -> String {
    format!("Please update your branch: git fetch origin && git rebase origin/{base_branch}")
}

fn ensure_rebase_instructions(comment: &str, base_branch: &str) -> String {
    if comment.contains("git rebase") {
        return comment.to_string();
    }
    if comment.is_empty() {
        return rebase_instructions(base_branch);
    }
    format!("{comment}\n\n{}", rebase_instructions(base_branch))
}

/// Process the result artifact a worker left for `task_id`.
///
/// Called by the finish sweep once the worker's PID is dead; handling a
/// result never requires the worker to be alive. An `Err` from a step
/// leaves the PID registered so a later sweep retries.
pub fn handle_agent_result<C: Clock, S: ServerClient, T: WorkTools>(
    s: &Scheduler<C, S, T>,
    task_id: &TaskId,
) -> Result<(), EngineError> {
    let Some(mut task) = s.client.get_task(task_id)? else {
        tracing::warn!(task_id = %task_id, "result for unknown task, ignoring");
        return Ok(());
    };

    let artifact = load_artifact(s, task_id);
    match artifact {
        None => handle_missing_artifact(s, &task),
        Some(ResultArtifact::Done) => {
            if task.queue != Queue::Claimed {
                tracing::info!(
                    task_id = %task_id,
                    queue = %task.queue,
                    "late done delivery, nothing to do"
                );
                return Ok(());
            }
            dispatch_transition(s, &mut task, &ResultArtifact::Done, "done")
        }
        Some(ResultArtifact::Failed { reason }) => {
            if task.queue.is_terminal() {
                tracing::info!(task_id = %task_id, "failed result for terminal task, ignoring");
                return Ok(());
            }
            tracing::info!(task_id = %task_id, reason = %reason, "worker gave up");
            s.client.update_queue(task_id, Queue::Failed, &TaskPatch::new())?;
            Ok(())
        }
        Some(ResultArtifact::NeedsContinuation) => {
            if task.queue != Queue::Claimed {
                tracing::info!(task_id = %task_id, queue = %task.queue, "late needs_continuation, ignoring");
                return Ok(());
            }
            s.client.update_queue(task_id, Queue::NeedsContinuation, &TaskPatch::new())?;
            Ok(())
        }
        Some(review @ ResultArtifact::Review { decision, .. }) => {
            if task.queue.is_terminal() {
                tracing::info!(task_id = %task_id, "review result for terminal task, ignoring");
                return Ok(());
            }
            let condition = decision.to_string();
            dispatch_transition(s, &mut task, &review, &condition)
        }
        Some(ResultArtifact::Error { detail }) => {
            tracing::warn!(task_id = %task_id, detail = %detail, "malformed result artifact");
            if task.queue.is_terminal() {
                return Ok(());
            }
            s.client.update_queue(task_id, Queue::Failed, &TaskPatch::new())?;
            Ok(())
        }
    }
}

fn load_artifact<C: Clock, S: ServerClient, T: WorkTools>(
    s: &Scheduler<C, S, T>,
    task_id: &TaskId,
) -> Option<ResultArtifact> {
    match std::fs::read_to_string(s.runtime.task_result(task_id)) {
        Ok(raw) => Some(ResultArtifact::parse(&raw)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            tracing::warn!(task_id = %task_id, error = %e, "unreadable result.json");
            Some(ResultArtifact::Error { detail: e.to_string() })
        }
    }
}

/// Worker crashed (or was killed) without writing a result.
fn handle_missing_artifact<C: Clock, S: ServerClient, T: WorkTools>(
    s: &Scheduler<C, S, T>,
    task: &Task,
) -> Result<(), EngineError> {
    if task.queue != Queue::Claimed {
        tracing::debug!(task_id = %task.id, queue = %task.queue, "no artifact and not claimed, nothing to do");
        return Ok(());
    }
    if s.runtime.task_notes(&task.id).exists() {
        tracing::info!(task_id = %task.id, "worker died but left notes, continuing later");
        s.client.update_queue(&task.id, Queue::NeedsContinuation, &TaskPatch::new())?;
    } else {
        tracing::warn!(task_id = %task.id, "worker died without a result, failing task");
        s.client.update_queue(&task.id, Queue::Failed, &TaskPatch::new())?;
    }
    Ok(())
}

/// Select the matching transition, run its steps, and finalize the
/// queue move.
pub fn dispatch_transition<C: Clock, S: ServerClient, T: WorkTools>(
    s: &Scheduler<C, S, T>,
    task: &mut Task,
    artifact: &ResultArtifact,
    condition: &str,
) -> Result<(), EngineError> {
    let flow = s.flow.flow_for(task);
    let Some(transition) = flow.select(task.queue, condition) else {
        tracing::warn!(
            task_id = %task.id,
            queue = %task.queue,
            condition = %condition,
            flow = %flow.name,
            "no transition matches, leaving task for recovery"
        );
        return Ok(());
    };

    match run_transition_steps(s, task, artifact, transition)? {
        StepsOutcome::GaveUp => Ok(()),
        StepsOutcome::Completed => finalize_transition(s, task, artifact, transition),
    }
}

/// Perform the target-state move through the matching server call,
/// unless a step (such as `submit`) already did.
fn finalize_transition<C: Clock, S: ServerClient, T: WorkTools>(
    s: &Scheduler<C, S, T>,
    task: &Task,
    artifact: &ResultArtifact,
    transition: &TransitionDef,
) -> Result<(), EngineError> {
    let Some(target) = transition.target() else {
        return Ok(());
    };
    let Some(current) = s.client.get_task(&task.id)? else {
        return Ok(());
    };
    if current.queue == target {
        return Ok(());
    }
    if current.queue != task.queue {
        // A step already moved the task somewhere else (e.g. the submit
        // step's zero-commit auto-reject). Re-issuing the target call
        // would double-count.
        tracing::info!(
            task_id = %task.id,
            queue = %current.queue,
            target = %target,
            "steps moved the task off-path, not finalizing"
        );
        return Ok(());
    }

    match target {
        Queue::Provisional => {
            let commits = s
                .tools
                .commits_ahead(&s.runtime.task_worktree(&task.id), &task.branch)
                .unwrap_or(task.commits_count);
            s.client.submit_task(&task.id, commits, current.turns_used.unwrap_or(0))?;
        }
        Queue::Done => {
            let accepted_by = current
                .claimed_by
                .as_ref()
                .map(|i| i.as_str().to_string())
                .unwrap_or_else(|| "scheduler".to_string());
            s.client.accept_task(&task.id, &accepted_by)?;
        }
        Queue::Incoming => {
            let (reason, feedback) = match artifact {
                ResultArtifact::Review { comment, .. } => (
                    "review_rejected",
                    ensure_rebase_instructions(comment, &task.branch),
                ),
                _ => ("rejected", rebase_instructions(&task.branch)),
            };
            s.client.reject_task(&task.id, reason, Some(&feedback))?;
        }
        Queue::Failed | Queue::NeedsContinuation | Queue::Claimed => {
            s.client.update_queue(&task.id, target, &TaskPatch::new())?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "results_tests.rs"]
mod tests;
