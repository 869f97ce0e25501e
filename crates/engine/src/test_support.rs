// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine and workspace tests.

use crate::scheduler::{ConfigDir, Scheduler, SchedulerConfig, SchedulerDeps};
use crate::tools::fake::FakeTools;
use fm_client::FakeServer;
use fm_core::{FakeClock, TaskId};
use fm_storage::RuntimeDir;
use std::path::Path;

/// The default flow used across the test suite, with a child flow for
/// project tasks.
pub const REFERENCE_FLOW: &str = r#"
name: default
states:
  claimed:
    - when: done
      steps: [push_branch, run_tests, create_pr, submit]
      to: provisional
    - when: children_complete
      steps: [merge_pr]
      to: done
  provisional:
    - when: approve
      steps: [post_review_comment, merge_pr]
      to: done
    - when: reject
      steps: [post_review_comment]
      to: incoming
child_flow:
  name: project_child
  states:
    claimed:
      - when: done
        steps: [rebase_on_project_branch, push_branch, create_pr, submit]
        to: provisional
"#;

/// A scheduler wired to fakes inside a temp directory.
pub struct Harness {
    // Held for its Drop; the path is reachable through the scheduler.
    _dir: tempfile::TempDir,
    pub clock: FakeClock,
    pub scheduler: Scheduler<FakeClock, FakeServer, FakeTools>,
}

impl Harness {
    /// Harness with the default flow and no agents or jobs.
    pub fn new() -> Harness {
        Harness::with_flow(REFERENCE_FLOW)
    }

    pub fn with_flow(flow: &str) -> Harness {
        let dir = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(e) => unreachable!("tempdir: {e}"),
        };
        let config_root = dir.path().join(".foreman");
        if let Err(e) = std::fs::create_dir_all(&config_root) {
            unreachable!("create config dir: {e}");
        }
        write(&config_root.join("flow.yaml"), flow);
        write(&config_root.join("agents.yaml"), "agents: []\n");
        write(&config_root.join("jobs.yaml"), "jobs: []\n");

        let clock = FakeClock::new();
        let deps = SchedulerDeps {
            clock: clock.clone(),
            client: FakeServer::new(clock.clone()),
            tools: FakeTools::new(),
        };
        let config = SchedulerConfig::new(dir.path().join("project"));
        let runtime = RuntimeDir::new(config_root.join("runtime"));
        let scheduler =
            match Scheduler::new(deps, ConfigDir::new(&config_root), runtime, config) {
                Ok(scheduler) => scheduler,
                Err(e) => unreachable!("scheduler startup: {e}"),
            };
        Harness { _dir: dir, clock, scheduler }
    }

    pub fn server(&self) -> &FakeServer {
        &self.scheduler.client
    }

    pub fn tools(&self) -> &FakeTools {
        &self.scheduler.tools
    }

    pub fn config_root(&self) -> std::path::PathBuf {
        match self.scheduler.runtime.root().parent() {
            Some(parent) => parent.to_path_buf(),
            None => unreachable!("runtime dir always has a parent"),
        }
    }

    /// Replace agents.yaml and reload.
    pub fn set_agents(&mut self, yaml: &str) {
        write(&self.config_root().join("agents.yaml"), yaml);
        if let Err(e) = self.scheduler.reload_config() {
            unreachable!("reload agents: {e}");
        }
    }

    /// Replace jobs.yaml and reload.
    pub fn set_jobs(&mut self, yaml: &str) {
        write(&self.config_root().join("jobs.yaml"), yaml);
        if let Err(e) = self.scheduler.reload_config() {
            unreachable!("reload jobs: {e}");
        }
    }

    /// Write a worker result artifact into the task directory.
    pub fn write_result(&self, task_id: &TaskId, raw: &str) {
        let path = self.scheduler.runtime.task_result(task_id);
        ensure_parent(&path);
        write(&path, raw);
    }

    /// Write a worker notes file into the task directory.
    pub fn write_notes(&self, task_id: &TaskId, raw: &str) {
        let path = self.scheduler.runtime.task_notes(task_id);
        ensure_parent(&path);
        write(&path, raw);
    }
}

impl Default for Harness {
    fn default() -> Self {
        Harness::new()
    }
}

fn ensure_parent(path: &Path) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            unreachable!("create {}: {e}", parent.display());
        }
    }
}

fn write(path: &Path, contents: &str) {
    if let Err(e) = std::fs::write(path, contents) {
        unreachable!("write {}: {e}", path.display());
    }
}
