// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Externally requested actions.
//!
//! The server queues `{id, action_type, payload}` records; a static
//! registry maps each `action_type` to a handler. Handler returns are
//! reported with `actions.complete`, handler errors with `actions.fail`,
//! and an unknown type fails with a diagnostic. Crashes inside the
//! completion-reporting calls are logged but never propagated.

use crate::scheduler::Scheduler;
use crate::tools::WorkTools;
use fm_client::{ActionRecord, NewTask, ServerClient};
use fm_storage::RuntimeDir;

/// What a handler may touch.
pub struct ActionCtx<'a> {
    pub runtime: &'a RuntimeDir,
    pub client: &'a dyn ServerClient,
}

pub type ActionHandler =
    for<'a, 'b> fn(&'a ActionCtx<'b>, &'a ActionRecord) -> Result<serde_json::Value, String>;

/// The action registry. String keys match the server's `action_type`.
pub const ACTION_HANDLERS: &[(&str, ActionHandler)] = &[
    ("ping", handle_ping),
    ("pause_scheduler", handle_pause),
    ("resume_scheduler", handle_resume),
    ("create_task", handle_create_task),
    ("cancel_task", handle_cancel_task),
];

pub fn handler_for(action_type: &str) -> Option<ActionHandler> {
    ACTION_HANDLERS.iter().find(|(name, _)| *name == action_type).map(|(_, f)| *f)
}

/// Poll for requested actions and dispatch each one.
pub fn process_actions<C: fm_core::Clock, S: ServerClient, T: WorkTools>(
    s: &Scheduler<C, S, T>,
) {
    let actions = match s.client.list_actions("execute_requested") {
        Ok(actions) => actions,
        Err(e) => {
            tracing::warn!(error = %e, "cannot fetch requested actions");
            return;
        }
    };
    if actions.is_empty() {
        return;
    }

    let ctx = ActionCtx { runtime: &s.runtime, client: &s.client };
    for action in &actions {
        let Some(handler) = handler_for(&action.action_type) else {
            let error = format!("unknown action_type: {}", action.action_type);
            tracing::warn!(action_id = %action.id, "{error}");
            if let Err(e) = s.client.fail_action(&action.id, &error) {
                tracing::warn!(action_id = %action.id, error = %e, "cannot report unknown action");
            }
            continue;
        };

        match handler(&ctx, action) {
            Ok(result) => {
                if let Err(e) = s.client.complete_action(&action.id, &result) {
                    tracing::warn!(action_id = %action.id, error = %e, "cannot mark action complete");
                }
            }
            Err(error) => {
                tracing::warn!(action_id = %action.id, action_type = %action.action_type, "{error}");
                if let Err(e) = s.client.fail_action(&action.id, &error) {
                    tracing::warn!(action_id = %action.id, error = %e, "cannot mark action failed");
                }
            }
        }
    }
}

fn handle_ping(_ctx: &ActionCtx<'_>, action: &ActionRecord) -> Result<serde_json::Value, String> {
    Ok(serde_json::json!({ "pong": action.payload }))
}

fn handle_pause(ctx: &ActionCtx<'_>, _action: &ActionRecord) -> Result<serde_json::Value, String> {
    std::fs::write(ctx.runtime.root().join("paused"), b"paused by action\n")
        .map_err(|e| e.to_string())?;
    Ok(serde_json::json!({ "paused": true }))
}

fn handle_resume(ctx: &ActionCtx<'_>, _action: &ActionRecord) -> Result<serde_json::Value, String> {
    let marker = ctx.runtime.root().join("paused");
    if marker.exists() {
        std::fs::remove_file(&marker).map_err(|e| e.to_string())?;
    }
    Ok(serde_json::json!({ "paused": false }))
}

fn handle_create_task(
    ctx: &ActionCtx<'_>,
    action: &ActionRecord,
) -> Result<serde_json::Value, String> {
    let new_task: NewTask = serde_json::from_value(action.payload.clone())
        .map_err(|e| format!("invalid create_task payload: {e}"))?;
    let task = ctx.client.create_task(&new_task).map_err(|e| e.to_string())?;
    Ok(serde_json::json!({ "task_id": task.id }))
}

/// Cancel a running worker: SIGKILL its PID and let the next finish
/// sweep pick the task up. There is no soft cancel in the core.
fn handle_cancel_task(
    ctx: &ActionCtx<'_>,
    action: &ActionRecord,
) -> Result<serde_json::Value, String> {
    let task_id = action
        .payload
        .get("task_id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| "cancel_task payload needs a task_id".to_string())?;

    let pool = fm_storage::PoolRegistry::new(ctx.runtime.clone());
    let blueprints = std::fs::read_dir(ctx.runtime.agents_dir())
        .map_err(|e| format!("cannot scan agents dir: {e}"))?;

    for entry in blueprints.flatten() {
        if !entry.path().is_dir() {
            continue;
        }
        let blueprint = fm_core::BlueprintName::new(entry.file_name().to_string_lossy());
        for (pid, tracked) in pool.load(&blueprint) {
            if tracked.task_id.as_ref().map(|t| t.as_str()) == Some(task_id) {
                let killed = fm_storage::process::kill_worker(pid);
                tracing::info!(task_id, pid, killed, "worker cancelled");
                return Ok(serde_json::json!({ "killed": killed, "pid": pid }));
            }
        }
    }
    Ok(serde_json::json!({ "killed": false }))
}

#[cfg(test)]
#[path = "actions_tests.rs"]
mod tests;
