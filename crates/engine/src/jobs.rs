// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Standard housekeeping job implementations.
//!
//! Each function here is registered by name in the dispatcher
//! (`housekeeping::script_jobs`). Remote jobs read from the shared poll
//! payload in their [`JobCtx`] instead of re-querying the server.

use crate::housekeeping::JobCtx;
use crate::results::dispatch_transition;
use crate::scheduler::Scheduler;
use crate::tools::WorkTools;
use crate::{actions, lease, EngineError};
use fm_client::{NewTask, ServerClient, TaskPatch};
use fm_core::{Clock, Priority, Queue, ResultArtifact, TaskId};
use serde::{Deserialize, Serialize};

pub fn lease_monitor<C: Clock, S: ServerClient, T: WorkTools>(
    s: &Scheduler<C, S, T>,
    _ctx: &JobCtx<'_>,
) -> Result<(), EngineError> {
    lease::run_lease_monitor(s);
    Ok(())
}

pub fn orchestrator_register<C: Clock, S: ServerClient, T: WorkTools>(
    s: &Scheduler<C, S, T>,
    ctx: &JobCtx<'_>,
) -> Result<(), EngineError> {
    if ctx.poll.map(|p| p.orchestrator_registered).unwrap_or(false) {
        tracing::debug!("orchestrator already registered, skipping");
        return Ok(());
    }
    let info = fm_client::OrchestratorInfo {
        id: s.orchestrator_id.clone(),
        hostname: std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string()),
        project_root: s.config.project_root.display().to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    s.client.register_orchestrator(&info)?;
    tracing::info!(orchestrator_id = %s.orchestrator_id, "orchestrator registered");
    Ok(())
}

pub fn heartbeat<C: Clock, S: ServerClient, T: WorkTools>(
    s: &Scheduler<C, S, T>,
    _ctx: &JobCtx<'_>,
) -> Result<(), EngineError> {
    if let Err(e) = s.client.heartbeat(&s.orchestrator_id) {
        tracing::warn!(error = %e, "heartbeat failed");
    }
    Ok(())
}

/// When every child task of a project is done, run the parent flow's
/// `children_complete` transition for the project task.
pub fn project_completion_check<C: Clock, S: ServerClient, T: WorkTools>(
    s: &Scheduler<C, S, T>,
    ctx: &JobCtx<'_>,
) -> Result<(), EngineError> {
    let Some(poll) = ctx.poll else {
        return Ok(());
    };
    for project in &poll.active_projects {
        if !project.children_complete() {
            continue;
        }
        let Some(task_id) = &project.project_task_id else {
            continue;
        };
        let task = match s.client.get_task(task_id) {
            Ok(Some(task)) => task,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(project = %project.id, error = %e, "cannot fetch project task");
                continue;
            }
        };
        let mut task = task;
        if let Err(e) = dispatch_transition(s, &mut task, &ResultArtifact::Done, "children_complete")
        {
            tracing::warn!(project = %project.id, error = %e, "children_complete transition failed");
        }
    }
    Ok(())
}

/// Structured queue-health summary with thresholds from the job config.
pub fn queue_health<C: Clock, S: ServerClient, T: WorkTools>(
    s: &Scheduler<C, S, T>,
    ctx: &JobCtx<'_>,
) -> Result<(), EngineError> {
    let Some(poll) = ctx.poll else {
        return Ok(());
    };
    let incoming = poll.queue_count("incoming");
    let claimed = poll.queue_count("claimed");
    let provisional = poll.queue_count("provisional");
    let alive: usize =
        s.agents.iter().map(|b| s.pool.count_alive(&b.pool_name())).sum();

    let incoming_warn = ctx
        .config
        .get("incoming_warn")
        .and_then(|v| v.as_u64())
        .unwrap_or(20);

    if incoming > incoming_warn {
        tracing::warn!(incoming, threshold = incoming_warn, "incoming queue is backing up");
    }
    if claimed > alive as u64 {
        tracing::warn!(claimed, alive_workers = alive, "more claimed tasks than live workers");
    }
    tracing::info!(incoming, claimed, provisional, alive_workers = alive, "queue health");
    Ok(())
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct IssuePollState {
    #[serde(default)]
    processed_issues: Vec<u64>,
}

/// Create tasks for unseen open GitHub issues.
pub fn github_issue_poll<C: Clock, S: ServerClient, T: WorkTools>(
    s: &Scheduler<C, S, T>,
    _ctx: &JobCtx<'_>,
) -> Result<(), EngineError> {
    let state_path = s.runtime.github_issues_state();
    let mut state: IssuePollState = fm_storage::snapshot::read_json_or_default(&state_path);

    let issues = match s.tools.list_issues(&s.config.project_root) {
        Ok(issues) => issues,
        Err(e) => {
            tracing::warn!(error = %e, "cannot list issues");
            return Ok(());
        }
    };

    let mut created = 0;
    for issue in issues {
        if state.processed_issues.contains(&issue.number) {
            continue;
        }

        let priority = if issue.labels.iter().any(|l| l == "urgent" || l == "critical") {
            Priority::Highest
        } else if issue.labels.iter().any(|l| l == "low-priority" || l == "low") {
            Priority::Low
        } else {
            Priority::High
        };

        let mut description = format!("**Issue:** [#{}]({})\n\n{}", issue.number, issue.url, issue.body);
        if !issue.labels.is_empty() {
            description.push_str(&format!("\n\n**Labels:** {}", issue.labels.join(", ")));
        }

        let new_task = NewTask {
            title: format!("[GH-{}] {}", issue.number, issue.title),
            description,
            role: "implement".to_string(),
            priority,
            branch: None,
            created_by: Some("github_issue_poll".to_string()),
        };
        let task = match s.client.create_task(&new_task) {
            Ok(task) => task,
            Err(e) => {
                tracing::warn!(issue = issue.number, error = %e, "cannot create task for issue");
                continue;
            }
        };

        let comment = format!(
            "Task `{}` was created for this issue and queued for an available agent.",
            task.id
        );
        if let Err(e) = s.tools.comment_on_issue(&s.config.project_root, issue.number, &comment) {
            tracing::warn!(issue = issue.number, error = %e, "cannot comment on issue");
        }

        state.processed_issues.push(issue.number);
        created += 1;
    }

    if created > 0 {
        state.processed_issues.sort_unstable();
        fm_storage::snapshot::write_json_atomic(&state_path, &state)?;
        tracing::info!(created, "tasks created from issues");
    }
    Ok(())
}

/// Remove task directories whose work finished longer than the
/// retention window ago. Directories held by a live worker are never
/// touched.
pub fn log_sweep<C: Clock, S: ServerClient, T: WorkTools>(
    s: &Scheduler<C, S, T>,
    ctx: &JobCtx<'_>,
) -> Result<(), EngineError> {
    let retention_days =
        ctx.config.get("retention_days").and_then(|v| v.as_u64()).unwrap_or(7);
    let retention_ms = retention_days * 24 * 60 * 60 * 1000;
    let now_ms = s.clock.epoch_ms();

    let mut active = std::collections::HashSet::new();
    for blueprint in &s.agents {
        active.extend(s.pool.active_task_ids(&blueprint.pool_name()));
    }

    let Ok(entries) = std::fs::read_dir(s.runtime.tasks_dir()) else {
        return Ok(());
    };
    for entry in entries.flatten() {
        let task_id = TaskId::new(entry.file_name().to_string_lossy());
        if active.contains(&task_id) {
            continue;
        }

        let age_ms = dir_mtime_ms(&entry.path()).map(|m| now_ms.saturating_sub(m)).unwrap_or(0);
        if age_ms < retention_ms {
            continue;
        }

        // Only reap directories whose task is terminal or gone.
        let reapable = match s.client.get_task(&task_id) {
            Ok(Some(task)) => task.queue.is_terminal(),
            Ok(None) => true,
            Err(e) => {
                tracing::warn!(task_id = %task_id, error = %e, "cannot check task before sweep");
                false
            }
        };
        if !reapable {
            continue;
        }

        match std::fs::remove_dir_all(entry.path()) {
            Ok(()) => tracing::info!(task_id = %task_id, "swept stale task directory"),
            Err(e) => tracing::warn!(task_id = %task_id, error = %e, "cannot sweep task directory"),
        }
    }
    Ok(())
}

fn dir_mtime_ms(path: &std::path::Path) -> Option<u64> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    let since_epoch = modified.duration_since(std::time::UNIX_EPOCH).ok()?;
    Some(since_epoch.as_millis() as u64)
}

/// Clear `blocked_by` on tasks whose prerequisites are all done.
pub fn unblock_sweep<C: Clock, S: ServerClient, T: WorkTools>(
    s: &Scheduler<C, S, T>,
    _ctx: &JobCtx<'_>,
) -> Result<(), EngineError> {
    let tasks = s.client.list_tasks(None)?;
    let done: std::collections::HashSet<&TaskId> =
        tasks.iter().filter(|t| t.queue == Queue::Done).map(|t| &t.id).collect();

    for task in &tasks {
        if task.blocked_by.is_empty() || task.queue.is_terminal() {
            continue;
        }
        if task.blocked_by.iter().all(|b| done.contains(b)) {
            tracing::info!(task_id = %task.id, "all blockers done, unblocking");
            if let Err(e) = s.client.update_task(&task.id, &TaskPatch::new().clear_blocked_by()) {
                tracing::warn!(task_id = %task.id, error = %e, "cannot unblock task");
            }
        }
    }
    Ok(())
}

pub fn action_dispatcher<C: Clock, S: ServerClient, T: WorkTools>(
    s: &Scheduler<C, S, T>,
    _ctx: &JobCtx<'_>,
) -> Result<(), EngineError> {
    actions::process_actions(s);
    Ok(())
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;
