// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime directory layout.
//!
//! All persisted scheduler state lives under one per-project runtime
//! directory:
//!
//! ```text
//! scheduler.lock                      advisory file lock
//! scheduler_state.json                last-run times per housekeeping job
//! orchestrator_id                     persisted generated identifier
//! github_issues_state.json            processed issue numbers
//! agents/<blueprint>/running_pids.json
//! agents/<blueprint>/lock
//! agents/<blueprint>/<instance>/state.json
//! agents/<blueprint>/<instance>/env.sh
//! tasks/<task_id>/worktree/
//! tasks/<task_id>/result.json         (worker-written)
//! tasks/<task_id>/notes.md            (worker-written, optional)
//! tasks/<task_id>/step_failure_count
//! logs/pid_audit.jsonl
//! ```

use fm_core::{BlueprintName, InstanceName, TaskId};
use std::path::{Path, PathBuf};

/// Path helpers for the per-project runtime directory.
#[derive(Debug, Clone)]
pub struct RuntimeDir {
    root: PathBuf,
}

impl RuntimeDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn scheduler_lock(&self) -> PathBuf {
        self.root.join("scheduler.lock")
    }

    pub fn scheduler_state(&self) -> PathBuf {
        self.root.join("scheduler_state.json")
    }

    pub fn orchestrator_id_file(&self) -> PathBuf {
        self.root.join("orchestrator_id")
    }

    pub fn github_issues_state(&self) -> PathBuf {
        self.root.join("github_issues_state.json")
    }

    pub fn agents_dir(&self) -> PathBuf {
        self.root.join("agents")
    }

    pub fn blueprint_dir(&self, blueprint: &BlueprintName) -> PathBuf {
        self.agents_dir().join(blueprint.as_str())
    }

    pub fn blueprint_pids(&self, blueprint: &BlueprintName) -> PathBuf {
        self.blueprint_dir(blueprint).join("running_pids.json")
    }

    pub fn blueprint_lock(&self, blueprint: &BlueprintName) -> PathBuf {
        self.blueprint_dir(blueprint).join("lock")
    }

    pub fn instance_dir(&self, blueprint: &BlueprintName, instance: &InstanceName) -> PathBuf {
        self.blueprint_dir(blueprint).join(instance.as_str())
    }

    pub fn instance_state(&self, blueprint: &BlueprintName, instance: &InstanceName) -> PathBuf {
        self.instance_dir(blueprint, instance).join("state.json")
    }

    pub fn tasks_dir(&self) -> PathBuf {
        self.root.join("tasks")
    }

    pub fn task_dir(&self, task_id: &TaskId) -> PathBuf {
        self.tasks_dir().join(task_id.as_str())
    }

    pub fn task_worktree(&self, task_id: &TaskId) -> PathBuf {
        self.task_dir(task_id).join("worktree")
    }

    pub fn task_result(&self, task_id: &TaskId) -> PathBuf {
        self.task_dir(task_id).join("result.json")
    }

    pub fn task_notes(&self, task_id: &TaskId) -> PathBuf {
        self.task_dir(task_id).join("notes.md")
    }

    pub fn step_failure_count(&self, task_id: &TaskId) -> PathBuf {
        self.task_dir(task_id).join("step_failure_count")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn pid_audit(&self) -> PathBuf {
        self.logs_dir().join("pid_audit.jsonl")
    }

    /// Create the top-level directories. Idempotent.
    pub fn ensure(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(self.agents_dir())?;
        std::fs::create_dir_all(self.tasks_dir())?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}
