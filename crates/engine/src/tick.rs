// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The tick: one full pass of the scheduler.
//!
//! Serial end-to-end under the scheduler lock: finish sweep, then the
//! agent evaluation loop, then housekeeping. A second scheduler finds
//! the lock held and reports [`TickOutcome::LockHeld`]; the caller exits
//! quietly.

use crate::guards::{self, EvalState, GuardOutcome};
use crate::scheduler::Scheduler;
use crate::tools::WorkTools;
use crate::{housekeeping, spawn, sweep, EngineError};
use fm_client::{PollData, ServerClient};
use fm_core::Clock;
use fm_storage::{LockGuard, SchedulerLedger};

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    pub swept: usize,
    pub spawned: usize,
    pub jobs_run: usize,
}

/// Result of attempting a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Completed(TickStats),
    /// Another scheduler instance holds the lock.
    LockHeld,
}

/// Run one tick.
pub fn run_tick<C: Clock, S: ServerClient, T: WorkTools>(
    s: &mut Scheduler<C, S, T>,
) -> Result<TickOutcome, EngineError> {
    s.runtime.ensure()?;
    let Some(mut lock) = LockGuard::try_acquire(&s.runtime.scheduler_lock())? else {
        tracing::info!("another scheduler instance is running");
        return Ok(TickOutcome::LockHeld);
    };
    lock.write_pid()?;

    // Malformed configuration refuses the tick rather than guessing.
    s.reload_config()?;

    // 1. Finish sweep: dead workers, their results, their pool slots.
    let swept = sweep::finish_sweep(s);

    // One batched poll serves both the evaluation loop (backpressure)
    // and the remote housekeeping jobs.
    let poll = match s.client.poll() {
        Ok(poll) => Some(poll),
        Err(e) => {
            tracing::warn!(error = %e, "batched poll failed, continuing without server data");
            None
        }
    };

    // 2. Agent evaluation loop.
    let spawned = evaluation_loop(s, poll.as_ref());

    // 3. Housekeeping.
    let mut ledger = SchedulerLedger::load(&s.runtime);
    let jobs_run = housekeeping::run_due_jobs(s, &mut ledger, poll.as_ref());
    ledger.save(&s.runtime)?;

    let stats = TickStats { swept, spawned, jobs_run };
    tracing::info!(
        swept = stats.swept,
        spawned = stats.spawned,
        jobs_run = stats.jobs_run,
        "tick complete"
    );
    Ok(TickOutcome::Completed(stats))
}

/// Evaluate every configured blueprint; spawn where the guard chain
/// passes. Failures are isolated per blueprint.
fn evaluation_loop<C: Clock, S: ServerClient, T: WorkTools>(
    s: &Scheduler<C, S, T>,
    poll: Option<&PollData>,
) -> usize {
    let mut spawned = 0;
    for (ordinal, blueprint) in s.agents.iter().enumerate() {
        if blueprint.name.is_empty() || blueprint.role.is_empty() {
            tracing::warn!(name = %blueprint.name, "skipping blueprint with empty name or role");
            continue;
        }

        // Belt-and-braces: the scheduler lock already serialises ticks,
        // but each blueprint keeps its own advisory lock as well.
        let blueprint_lock =
            match LockGuard::try_acquire(&s.runtime.blueprint_lock(&blueprint.pool_name())) {
                Ok(Some(guard)) => guard,
                Ok(None) => {
                    tracing::debug!(blueprint = %blueprint.name, "blueprint locked, skipping");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(blueprint = %blueprint.name, error = %e, "cannot lock blueprint");
                    continue;
                }
            };

        let (instance, inst_state) = spawn::pick_instance(s, blueprint);
        let mut state = EvalState { blueprint, ordinal, poll, instance, inst_state, task: None };

        match guards::evaluate(s, &mut state) {
            Ok(GuardOutcome::Proceed) => match spawn::spawn_for(s, &state) {
                Ok(_) => spawned += 1,
                Err(e) => {
                    tracing::warn!(blueprint = %blueprint.name, error = %e, "spawn failed");
                }
            },
            Ok(GuardOutcome::Abort(reason)) => {
                tracing::info!(blueprint = %blueprint.name, reason = %reason, "not spawning");
            }
            Err(e) => {
                tracing::warn!(blueprint = %blueprint.name, error = %e, "agent evaluation failed");
            }
        }
        drop(blueprint_lock);
    }
    spawned
}

#[cfg(test)]
#[path = "tick_tests.rs"]
mod tests;
