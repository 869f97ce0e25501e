// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Finish sweep: detect dead workers, process their results, free slots.
//!
//! This is the only place a dead PID leaves the pool registry, and it
//! only does so after the result handler returned cleanly. A step
//! failure keeps the PID (and the task directory) so the next sweep
//! retries; the retry counter in the step runner bounds how long that
//! can go on.

use crate::results::handle_agent_result;
use crate::scheduler::Scheduler;
use crate::tools::WorkTools;
use fm_client::ServerClient;
use fm_core::{BlueprintName, Clock, InstanceState};
use fm_storage::{process, snapshot};

/// Sweep every blueprint's pool for dead workers.
///
/// Returns the number of pool entries released. Failures are isolated
/// per entry: one bad task directory never blocks the rest of the sweep.
pub fn finish_sweep<C: Clock, S: ServerClient, T: WorkTools>(s: &Scheduler<C, S, T>) -> usize {
    let mut released = 0;
    for blueprint in tracked_blueprints(s) {
        for (pid, entry) in s.pool.load(&blueprint) {
            if process::alive(pid) {
                continue;
            }

            if let Some(task_id) = &entry.task_id {
                match handle_agent_result(s, task_id) {
                    Ok(()) => {}
                    Err(e) => {
                        tracing::warn!(
                            blueprint = %blueprint,
                            pid,
                            task_id = %task_id,
                            error = %e,
                            "result handling failed, keeping PID for retry"
                        );
                        continue;
                    }
                }
            }

            match s.pool.remove_finished(&blueprint, pid, &s.clock) {
                Ok(_) => {
                    mark_instance_finished(s, &blueprint, &entry.instance_name, pid);
                    released += 1;
                    tracing::info!(blueprint = %blueprint, pid, "worker finished");
                }
                Err(e) => {
                    tracing::warn!(blueprint = %blueprint, pid, error = %e, "cannot release pool entry");
                }
            }
        }
    }
    released
}

/// Blueprints that have a pool file on disk. Derived from the agents
/// runtime directory rather than agents.yaml so workers of a deleted
/// blueprint still get swept.
fn tracked_blueprints<C: Clock, S: ServerClient, T: WorkTools>(
    s: &Scheduler<C, S, T>,
) -> Vec<BlueprintName> {
    let mut blueprints = Vec::new();
    let Ok(entries) = std::fs::read_dir(s.runtime.agents_dir()) else {
        return blueprints;
    };
    for entry in entries.flatten() {
        if entry.path().is_dir() {
            blueprints.push(BlueprintName::new(entry.file_name().to_string_lossy()));
        }
    }
    blueprints.sort();
    blueprints
}

/// Update the instance state record if it still points at the dead PID.
fn mark_instance_finished<C: Clock, S: ServerClient, T: WorkTools>(
    s: &Scheduler<C, S, T>,
    blueprint: &BlueprintName,
    instance: &fm_core::InstanceName,
    pid: i32,
) {
    let path = s.runtime.instance_state(blueprint, instance);
    let state: InstanceState = snapshot::read_json_or_default(&path);
    if state.pid != Some(pid) {
        return;
    }
    // Exit codes are not observable for detached workers; the result
    // artifact, not the exit code, is the source of truth for outcome.
    let finished = state.mark_finished(0, &s.clock);
    if let Err(e) = snapshot::write_json_atomic(&path, &finished) {
        tracing::warn!(instance = %instance, error = %e, "cannot update instance state");
    }
}

#[cfg(test)]
#[path = "sweep_tests.rs"]
mod tests;
