// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent-evaluation guard chain.
//!
//! An ordered chain of predicates gates every spawn. The first guard to
//! return [`GuardOutcome::Abort`] ends the evaluation for that blueprint;
//! a spawn happens iff every guard proceeds. Abort reasons are stable
//! machine-readable keys (`at_capacity`, `not_due`, `duplicate_task`,
//! `pr_conflicts`, `empty_description`, `backpressure:<detail>`) and are
//! logged, never raised.

use crate::results::rebase_instructions;
use crate::scheduler::Scheduler;
use crate::tools::{MergeState, WorkTools};
use crate::EngineError;
use fm_client::{ClaimParams, PollData, ServerClient};
use fm_core::{AgentBlueprint, Clock, InstanceName, InstanceState, Queue, Task};
use fm_storage::snapshot;

/// Result of one guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    Proceed,
    Abort(String),
}

/// Mutable evaluation state threaded through the chain.
pub struct EvalState<'a> {
    pub blueprint: &'a AgentBlueprint,
    /// Position in agents.yaml; used for port allocation.
    pub ordinal: usize,
    pub poll: Option<&'a PollData>,
    pub instance: InstanceName,
    pub inst_state: InstanceState,
    /// Set by the claim guard.
    pub task: Option<Task>,
}

pub type GuardFn<C, S, T> =
    fn(&Scheduler<C, S, T>, &mut EvalState<'_>) -> Result<GuardOutcome, EngineError>;

/// The chain, in evaluation order.
pub fn guard_chain<C: Clock, S: ServerClient, T: WorkTools>(
) -> Vec<(&'static str, GuardFn<C, S, T>)> {
    vec![
        ("enabled", guard_enabled),
        ("pool_capacity", guard_pool_capacity),
        ("interval", guard_interval),
        ("not_running", guard_not_running),
        ("backpressure", guard_backpressure),
        ("claim_task", guard_claim_task),
        ("task_description_nonempty", guard_task_description),
        ("pr_mergeable", guard_pr_mergeable),
    ]
}

/// Run the full chain. Short-circuits on the first abort.
pub fn evaluate<C: Clock, S: ServerClient, T: WorkTools>(
    s: &Scheduler<C, S, T>,
    state: &mut EvalState<'_>,
) -> Result<GuardOutcome, EngineError> {
    for (name, guard) in guard_chain::<C, S, T>() {
        match guard(s, state)? {
            GuardOutcome::Proceed => {}
            GuardOutcome::Abort(reason) => {
                tracing::debug!(
                    blueprint = %state.blueprint.name,
                    guard = name,
                    reason = %reason,
                    "guard rejected spawn"
                );
                return Ok(GuardOutcome::Abort(reason));
            }
        }
    }
    Ok(GuardOutcome::Proceed)
}

fn guard_enabled<C: Clock, S: ServerClient, T: WorkTools>(
    s: &Scheduler<C, S, T>,
    state: &mut EvalState<'_>,
) -> Result<GuardOutcome, EngineError> {
    if s.globally_paused() {
        return Ok(GuardOutcome::Abort("scheduler_paused".to_string()));
    }
    if state.blueprint.paused {
        return Ok(GuardOutcome::Abort("paused".to_string()));
    }
    Ok(GuardOutcome::Proceed)
}

fn guard_pool_capacity<C: Clock, S: ServerClient, T: WorkTools>(
    s: &Scheduler<C, S, T>,
    state: &mut EvalState<'_>,
) -> Result<GuardOutcome, EngineError> {
    let alive = s.pool.count_alive(&state.blueprint.pool_name());
    if alive >= state.blueprint.max_instances {
        return Ok(GuardOutcome::Abort("at_capacity".to_string()));
    }
    Ok(GuardOutcome::Proceed)
}

fn guard_interval<C: Clock, S: ServerClient, T: WorkTools>(
    s: &Scheduler<C, S, T>,
    state: &mut EvalState<'_>,
) -> Result<GuardOutcome, EngineError> {
    if !state.inst_state.is_due(state.blueprint.interval_seconds, &s.clock) {
        return Ok(GuardOutcome::Abort("not_due".to_string()));
    }
    Ok(GuardOutcome::Proceed)
}

/// The previous worker of this instance must have fully finished.
///
/// A recorded-but-absent PID means the instance is idle, not crashed:
/// the state is cleared without touching the failure counters.
fn guard_not_running<C: Clock, S: ServerClient, T: WorkTools>(
    s: &Scheduler<C, S, T>,
    state: &mut EvalState<'_>,
) -> Result<GuardOutcome, EngineError> {
    if !state.inst_state.running {
        return Ok(GuardOutcome::Proceed);
    }
    let path = s.runtime.instance_state(&state.blueprint.pool_name(), &state.instance);
    match state.inst_state.pid {
        Some(pid) if fm_storage::process::alive(pid) => {
            Ok(GuardOutcome::Abort("still_running".to_string()))
        }
        Some(_) => {
            // Marked running but the process died: record the crash.
            let finished = state.inst_state.mark_finished(1, &s.clock);
            snapshot::write_json_atomic(&path, &finished)?;
            state.inst_state = finished;
            Ok(GuardOutcome::Proceed)
        }
        None => {
            let mut cleared = state.inst_state.clone();
            cleared.running = false;
            snapshot::write_json_atomic(&path, &cleared)?;
            state.inst_state = cleared;
            Ok(GuardOutcome::Proceed)
        }
    }
}

/// Skip spawning implementers while their downstream review queue is
/// saturated.
fn guard_backpressure<C: Clock, S: ServerClient, T: WorkTools>(
    s: &Scheduler<C, S, T>,
    state: &mut EvalState<'_>,
) -> Result<GuardOutcome, EngineError> {
    if Scheduler::<C, S, T>::is_reviewer(state.blueprint) || !state.blueprint.claims_tasks() {
        return Ok(GuardOutcome::Proceed);
    }
    let Some(poll) = state.poll else {
        return Ok(GuardOutcome::Proceed);
    };
    let provisional = poll.queue_count("provisional");
    if provisional >= s.config.max_provisional {
        return Ok(GuardOutcome::Abort(format!("backpressure:provisional={provisional}")));
    }
    Ok(GuardOutcome::Proceed)
}

/// Claim work for the evaluation.
///
/// Implementers claim atomically from `incoming`; review strategies are
/// dispatched against `provisional` tasks without a server-side claim.
/// Either way the duplicate rule applies: the server can re-surface a
/// task after a lease expiry before the scheduler has observed the
/// original worker exit, and spawning a second worker for it would race
/// the first.
fn guard_claim_task<C: Clock, S: ServerClient, T: WorkTools>(
    s: &Scheduler<C, S, T>,
    state: &mut EvalState<'_>,
) -> Result<GuardOutcome, EngineError> {
    let pool_name = state.blueprint.pool_name();

    if Scheduler::<C, S, T>::is_reviewer(state.blueprint) {
        let active = s.pool.active_task_ids(&pool_name);
        let provisional = match state.poll {
            Some(poll) => poll.provisional_tasks.clone(),
            None => s.client.list_tasks(Some(Queue::Provisional))?,
        };
        let Some(task) = provisional.into_iter().find(|t| !active.contains(&t.id)) else {
            return Ok(GuardOutcome::Abort("no_tasks".to_string()));
        };
        state.task = Some(task);
        return Ok(GuardOutcome::Proceed);
    }

    if !state.blueprint.claims_tasks() {
        return Ok(GuardOutcome::Proceed);
    }

    let claimed = s.client.claim_task(&ClaimParams {
        orchestrator_id: &s.orchestrator_id,
        agent_name: &state.instance,
        role_filter: &state.blueprint.role,
        lease_duration_seconds: Some(s.config.lease_duration_seconds),
    })?;
    let Some(task) = claimed else {
        return Ok(GuardOutcome::Abort("no_tasks".to_string()));
    };

    if s.pool.active_task_ids(&pool_name).contains(&task.id) {
        return Ok(GuardOutcome::Abort(format!("duplicate_task:{}", task.id)));
    }

    state.task = Some(task);
    Ok(GuardOutcome::Proceed)
}

/// A claimed task must carry a non-empty description; spawning a worker
/// on an empty task burns a slot for nothing.
fn guard_task_description<C: Clock, S: ServerClient, T: WorkTools>(
    s: &Scheduler<C, S, T>,
    state: &mut EvalState<'_>,
) -> Result<GuardOutcome, EngineError> {
    if Scheduler::<C, S, T>::is_reviewer(state.blueprint) || !state.blueprint.claims_tasks() {
        return Ok(GuardOutcome::Proceed);
    }
    let Some(task) = &state.task else {
        return Ok(GuardOutcome::Proceed);
    };
    if task.description.trim().is_empty() {
        s.client.update_queue(&task.id, Queue::Failed, &fm_client::TaskPatch::new())?;
        return Ok(GuardOutcome::Abort("empty_description".to_string()));
    }
    Ok(GuardOutcome::Proceed)
}

/// Review strategies only: a task whose PR is in a conflicting state is
/// returned to `incoming` with rebase instructions instead of burning a
/// reviewer on it.
fn guard_pr_mergeable<C: Clock, S: ServerClient, T: WorkTools>(
    s: &Scheduler<C, S, T>,
    state: &mut EvalState<'_>,
) -> Result<GuardOutcome, EngineError> {
    if !Scheduler::<C, S, T>::is_reviewer(state.blueprint) {
        return Ok(GuardOutcome::Proceed);
    }
    let Some(task) = &state.task else {
        return Ok(GuardOutcome::Proceed);
    };
    let Some(pr_number) = task.pr_number else {
        return Ok(GuardOutcome::Proceed);
    };

    let worktree = s.runtime.task_worktree(&task.id);
    match s.tools.pr_mergeable(&worktree, pr_number)? {
        MergeState::Conflicting => {
            let reason = format!("pr_conflicts: {}", rebase_instructions(&task.branch));
            s.client.reject_task(&task.id, &reason, Some(&reason))?;
            Ok(GuardOutcome::Abort("pr_conflicts".to_string()))
        }
        MergeState::Mergeable | MergeState::Unknown => Ok(GuardOutcome::Proceed),
    }
}

#[cfg(test)]
#[path = "guards_tests.rs"]
mod tests;
