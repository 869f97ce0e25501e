// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spawn strategies: prepare the task directory, launch the worker,
//! register its PID.
//!
//! Three strategies exist: `worktree` (long-lived checkout per
//! instance), `task` (per-task checkout on branch `agent/<task_id>`),
//! and `lightweight` (bare directory for server-only agents). Every
//! strategy registers the spawned PID with the pool registry before the
//! tick continues.

use crate::guards::EvalState;
use crate::scheduler::Scheduler;
use crate::tools::{SpawnSpec, ToolError, WorkTools};
use crate::EngineError;
use fm_client::ServerClient;
use fm_core::{Clock, InstanceName, InstanceState, SpawnMode, TaskId};
use fm_storage::snapshot;
use std::path::{Path, PathBuf};

/// Deterministic per-instance port block.
fn port_base(ordinal: usize) -> u32 {
    9000 + 10 * ordinal as u32
}

/// Pick the first instance slot that is not occupied by a live worker.
pub fn pick_instance<C: Clock, S: ServerClient, T: WorkTools>(
    s: &Scheduler<C, S, T>,
    blueprint: &fm_core::AgentBlueprint,
) -> (InstanceName, InstanceState) {
    let pool_name = blueprint.pool_name();
    let mut fallback = None;
    for slot in 1..=blueprint.max_instances.max(1) {
        let instance = InstanceName::for_slot(&pool_name, slot);
        let state: InstanceState =
            snapshot::read_json_or_default(&s.runtime.instance_state(&pool_name, &instance));
        let busy = state.running
            && state.pid.map(fm_storage::process::alive).unwrap_or(false);
        if !busy {
            return (instance, state);
        }
        fallback = Some((instance, state));
    }
    // All slots busy; the capacity guard will abort this evaluation.
    fallback.unwrap_or_else(|| {
        (InstanceName::for_slot(&pool_name, 1), InstanceState::default())
    })
}

/// Launch a worker for an evaluation that passed the guard chain.
///
/// Returns the spawned PID. The PID is registered with the pool and the
/// instance state is marked started before returning.
pub fn spawn_for<C: Clock, S: ServerClient, T: WorkTools>(
    s: &Scheduler<C, S, T>,
    state: &EvalState<'_>,
) -> Result<i32, EngineError> {
    let blueprint = state.blueprint;
    let pool_name = blueprint.pool_name();
    let instance_dir = s.runtime.instance_dir(&pool_name, &state.instance);
    std::fs::create_dir_all(&instance_dir)?;

    let task_id = state.task.as_ref().map(|t| t.id.clone());
    let workdir = prepare_workdir(s, state, &instance_dir)?;

    let env = worker_env(s, state, &workdir);
    write_env_file(&instance_dir, &env)?;

    let spec = SpawnSpec {
        command: s.config.worker_command.clone(),
        workdir,
        env,
        log_dir: s.runtime.logs_dir(),
        log_stem: state.instance.as_str().to_string(),
    };
    let pid = s.tools.spawn_worker(&spec)?;

    s.pool.register(&pool_name, pid, task_id.clone(), state.instance.clone(), &s.clock)?;

    let started = state.inst_state.mark_started(pid, task_id, &s.clock);
    snapshot::write_json_atomic(
        &s.runtime.instance_state(&pool_name, &state.instance),
        &started,
    )?;

    tracing::info!(
        blueprint = %blueprint.name,
        instance = %state.instance,
        pid,
        task_id = state.task.as_ref().map(|t| t.id.as_str()).unwrap_or("-"),
        "worker spawned"
    );
    Ok(pid)
}

/// Prepare the directory the worker runs in, according to the spawn mode.
fn prepare_workdir<C: Clock, S: ServerClient, T: WorkTools>(
    s: &Scheduler<C, S, T>,
    state: &EvalState<'_>,
    instance_dir: &Path,
) -> Result<PathBuf, EngineError> {
    match state.blueprint.spawn_mode {
        SpawnMode::Worktree => {
            let dest = instance_dir.join("worktree");
            let base = state.blueprint.base_branch.as_deref().unwrap_or("main");
            let branch = format!("agent/{}", state.instance);
            s.tools.ensure_worktree(&s.config.project_root, &dest, base, &branch)?;
            Ok(dest)
        }
        SpawnMode::Task => {
            let task = state.task.as_ref().ok_or_else(|| {
                EngineError::Tool(ToolError("task strategy evaluated without a claimed task".into()))
            })?;
            let dest = s.runtime.task_worktree(&task.id);
            // The checkout is left on the named agent branch so the
            // flow's push step has a branch to push.
            let branch = agent_branch(&task.id);
            s.tools.create_task_checkout(&s.config.project_root, &dest, &task.branch, &branch)?;
            Ok(dest)
        }
        SpawnMode::Lightweight => Ok(instance_dir.to_path_buf()),
    }
}

fn agent_branch(task_id: &TaskId) -> String {
    format!("agent/{task_id}")
}

/// Environment handed to the worker (also persisted as `env.sh`).
fn worker_env<C: Clock, S: ServerClient, T: WorkTools>(
    s: &Scheduler<C, S, T>,
    state: &EvalState<'_>,
    workdir: &Path,
) -> Vec<(String, String)> {
    let base = port_base(state.ordinal);
    let mut env = vec![
        ("AGENT_NAME".to_string(), state.instance.as_str().to_string()),
        ("AGENT_ID".to_string(), state.ordinal.to_string()),
        ("AGENT_ROLE".to_string(), state.blueprint.role.clone()),
        (
            "PARENT_PROJECT".to_string(),
            s.config.project_root.display().to_string(),
        ),
        ("WORKTREE".to_string(), workdir.display().to_string()),
        (
            "SHARED_DIR".to_string(),
            s.runtime.root().join("shared").display().to_string(),
        ),
        (
            "ORCHESTRATOR_DIR".to_string(),
            s.runtime.root().display().to_string(),
        ),
        ("AGENT_PORT_BASE".to_string(), base.to_string()),
        ("AGENT_DEV_PORT".to_string(), (base + 1).to_string()),
    ];
    if let Some(task) = &state.task {
        env.push(("CURRENT_TASK_ID".to_string(), task.id.as_str().to_string()));
    }
    env
}

fn write_env_file(instance_dir: &Path, env: &[(String, String)]) -> std::io::Result<()> {
    let mut lines = vec!["#!/bin/bash".to_string()];
    for (key, value) in env {
        lines.push(format!("export {key}='{value}'"));
    }
    std::fs::write(instance_dir.join("env.sh"), lines.join("\n") + "\n")
}

#[cfg(test)]
#[path = "spawn_tests.rs"]
mod tests;
