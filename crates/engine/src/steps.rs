// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named steps attached to flow transitions.
//!
//! Steps communicate only by mutating server state and the filesystem;
//! they return nothing. New steps are registered by name in the static
//! [`STEPS`] table, which the flow loader is validated against at
//! startup.

use crate::tools::WorkTools;
use crate::EngineError;
use fm_client::{ServerClient, TaskPatch};
use fm_core::{ResultArtifact, Task};
use fm_playbook::FlowDef;
use std::path::PathBuf;

/// A step failure. The step runner turns these into retry-counter
/// bookkeeping.
#[derive(Debug, thiserror::Error)]
#[error("{step}: {detail}")]
pub struct StepError {
    pub step: &'static str,
    pub detail: String,
}

fn fail(step: &'static str, detail: impl std::fmt::Display) -> StepError {
    StepError { step, detail: detail.to_string() }
}

/// Everything a step may touch.
pub struct StepContext<'a> {
    pub task: &'a mut Task,
    pub artifact: &'a ResultArtifact,
    pub task_dir: PathBuf,
    pub worktree: PathBuf,
    pub client: &'a dyn ServerClient,
    pub tools: &'a dyn WorkTools,
    pub test_command: Option<&'a str>,
}

impl StepContext<'_> {
    /// Branch the worker committed on.
    pub fn agent_branch(&self) -> String {
        format!("agent/{}", self.task.id)
    }
}

pub type StepFn = for<'a, 'b> fn(&'a mut StepContext<'b>) -> Result<(), StepError>;

/// The step registry. String keys are required by the YAML flow files.
pub const STEPS: &[(&str, StepFn)] = &[
    ("push_branch", step_push_branch),
    ("run_tests", step_run_tests),
    ("create_pr", step_create_pr),
    ("submit", step_submit),
    ("post_review_comment", step_post_review_comment),
    ("merge_pr", step_merge_pr),
    ("rebase_on_project_branch", step_rebase_on_project_branch),
];

pub fn lookup(name: &str) -> Option<StepFn> {
    STEPS.iter().find(|(step, _)| *step == name).map(|(_, f)| *f)
}

/// Startup check: every step a flow references must be registered.
pub fn validate_flow(flow: &FlowDef) -> Result<(), EngineError> {
    for step in flow.referenced_steps() {
        if lookup(step).is_none() {
            return Err(EngineError::UnknownStep {
                flow: flow.name.clone(),
                step: step.to_string(),
            });
        }
    }
    Ok(())
}

/// Ensure the local branch is `agent/<task_id>`, then push it.
/// "Everything up-to-date" exits zero and is success.
fn step_push_branch(ctx: &mut StepContext<'_>) -> Result<(), StepError> {
    let branch = ctx.agent_branch();
    let current = ctx
        .tools
        .current_branch(&ctx.worktree)
        .map_err(|e| fail("push_branch", e))?;
    if current != branch {
        ctx.tools
            .checkout_branch(&ctx.worktree, &branch)
            .map_err(|e| fail("push_branch", e))?;
    }
    ctx.tools.push_branch(&ctx.worktree, &branch).map_err(|e| fail("push_branch", e))
}

fn step_run_tests(ctx: &mut StepContext<'_>) -> Result<(), StepError> {
    let passed = ctx
        .tools
        .run_tests(&ctx.worktree, ctx.test_command)
        .map_err(|e| fail("run_tests", e))?;
    if !passed {
        return Err(fail("run_tests", "test command exited non-zero"));
    }
    Ok(())
}

/// Create the PR for the agent branch, reusing an existing one instead
/// of calling create twice.
fn step_create_pr(ctx: &mut StepContext<'_>) -> Result<(), StepError> {
    if ctx.task.pr_number.is_some() {
        return Ok(());
    }
    let branch = ctx.agent_branch();
    let existing = ctx
        .tools
        .pr_for_branch(&ctx.worktree, &branch)
        .map_err(|e| fail("create_pr", e))?;
    let pr = match existing {
        Some(pr) => pr,
        None => ctx
            .tools
            .create_pr(&ctx.worktree, &branch, &ctx.task.branch, &ctx.task.title, &ctx.task.description)
            .map_err(|e| fail("create_pr", e))?,
    };
    ctx.client
        .update_task(&ctx.task.id, &TaskPatch::new().pr(pr.number, pr.url.clone()))
        .map_err(|e| fail("create_pr", e))?;
    ctx.task.pr_number = Some(pr.number);
    ctx.task.pr_url = Some(pr.url);
    Ok(())
}

/// Submit the completion to the server (`claimed → provisional`, with
/// the zero-commit auto-reject applied at the client layer).
fn step_submit(ctx: &mut StepContext<'_>) -> Result<(), StepError> {
    let commits = ctx
        .tools
        .commits_ahead(&ctx.worktree, &ctx.task.branch)
        .map_err(|e| fail("submit", e))?;
    ctx.client
        .submit_task(&ctx.task.id, commits, ctx.task.turns_used.unwrap_or(0))
        .map_err(|e| fail("submit", e))?;
    Ok(())
}

fn step_post_review_comment(ctx: &mut StepContext<'_>) -> Result<(), StepError> {
    let Some(number) = ctx.task.pr_number else {
        tracing::debug!(task_id = %ctx.task.id, "no PR to comment on, skipping");
        return Ok(());
    };
    let body = match ctx.artifact {
        ResultArtifact::Review { decision, comment } => format!("{decision}: {comment}"),
        other => format!("scheduler: {}", other.kind()),
    };
    ctx.tools
        .comment_on_pr(&ctx.worktree, number, &body)
        .map_err(|e| fail("post_review_comment", e))
}

/// Merge the PR; a non-zero exit from the merge tool propagates.
fn step_merge_pr(ctx: &mut StepContext<'_>) -> Result<(), StepError> {
    let Some(number) = ctx.task.pr_number else {
        return Err(fail("merge_pr", "task has no pr_number"));
    };
    ctx.tools.merge_pr(&ctx.worktree, number).map_err(|e| fail("merge_pr", e))
}

fn step_rebase_on_project_branch(ctx: &mut StepContext<'_>) -> Result<(), StepError> {
    let clean = ctx
        .tools
        .rebase_onto(&ctx.worktree, &ctx.task.branch)
        .map_err(|e| fail("rebase_on_project_branch", e))?;
    if !clean {
        return Err(fail(
            "rebase_on_project_branch",
            format!("rebase onto origin/{} hit conflicts", ctx.task.branch),
        ));
    }
    Ok(())
}

#[cfg(test)]
#[path = "steps_tests.rs"]
mod tests;
