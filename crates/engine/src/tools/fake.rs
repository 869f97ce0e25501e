// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted tools for tests: records every call, returns configured
//! results, and never touches git, gh, or real processes.

use super::{IssueInfo, MergeState, PrInfo, SpawnSpec, ToolError, WorkTools};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::Path;

#[derive(Default)]
struct FakeInner {
    calls: Vec<String>,
    failing: BTreeSet<String>,
    spawn_pids: VecDeque<i32>,
    spawned: Vec<SpawnSpec>,
    branches: BTreeMap<String, String>,
    prs: BTreeMap<String, PrInfo>,
    next_pr_number: u64,
    commits_ahead: u32,
    mergeable: MergeState,
    rebase_ok: bool,
    tests_pass: bool,
    issues: Vec<IssueInfo>,
    pr_comments: Vec<(u64, String)>,
    issue_comments: Vec<(u64, String)>,
    merged_prs: Vec<u64>,
}

/// Recording fake for [`WorkTools`].
pub struct FakeTools {
    inner: Mutex<FakeInner>,
}

impl Default for FakeTools {
    fn default() -> Self {
        FakeTools::new()
    }
}

impl FakeTools {
    pub fn new() -> FakeTools {
        FakeTools {
            inner: Mutex::new(FakeInner {
                next_pr_number: 100,
                commits_ahead: 1,
                mergeable: MergeState::Mergeable,
                rebase_ok: true,
                tests_pass: true,
                ..Default::default()
            }),
        }
    }

    /// Make the named method fail until cleared.
    pub fn fail_on(&self, method: &str) {
        self.inner.lock().failing.insert(method.to_string());
    }

    pub fn clear_failure(&self, method: &str) {
        self.inner.lock().failing.remove(method);
    }

    /// PIDs handed out by `spawn_worker`, in order. When exhausted, a
    /// certainly-dead PID is returned so sweep-oriented tests work by
    /// default.
    pub fn push_spawn_pid(&self, pid: i32) {
        self.inner.lock().spawn_pids.push_back(pid);
    }

    pub fn set_commits_ahead(&self, n: u32) {
        self.inner.lock().commits_ahead = n;
    }

    pub fn set_mergeable(&self, state: MergeState) {
        self.inner.lock().mergeable = state;
    }

    pub fn set_rebase_ok(&self, ok: bool) {
        self.inner.lock().rebase_ok = ok;
    }

    pub fn set_tests_pass(&self, pass: bool) {
        self.inner.lock().tests_pass = pass;
    }

    pub fn set_existing_pr(&self, branch: &str, pr: PrInfo) {
        self.inner.lock().prs.insert(branch.to_string(), pr);
    }

    pub fn set_issues(&self, issues: Vec<IssueInfo>) {
        self.inner.lock().issues = issues;
    }

    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().calls.clone()
    }

    pub fn spawned(&self) -> Vec<SpawnSpec> {
        self.inner.lock().spawned.clone()
    }

    pub fn merged_prs(&self) -> Vec<u64> {
        self.inner.lock().merged_prs.clone()
    }

    pub fn pr_comments(&self) -> Vec<(u64, String)> {
        self.inner.lock().pr_comments.clone()
    }

    pub fn issue_comments(&self) -> Vec<(u64, String)> {
        self.inner.lock().issue_comments.clone()
    }

    fn record(&self, method: &str, detail: String) -> Result<(), ToolError> {
        let mut inner = self.inner.lock();
        inner.calls.push(format!("{method}({detail})"));
        if inner.failing.contains(method) {
            return Err(ToolError(format!("{method}: injected failure")));
        }
        Ok(())
    }
}

impl WorkTools for FakeTools {
    fn ensure_worktree(
        &self,
        _repo: &Path,
        dest: &Path,
        _base_branch: &str,
        branch: &str,
    ) -> Result<(), ToolError> {
        self.record("ensure_worktree", format!("{}@{branch}", dest.display()))?;
        let mut inner = self.inner.lock();
        inner.branches.insert(dest.display().to_string(), branch.to_string());
        drop(inner);
        std::fs::create_dir_all(dest).map_err(ToolError::from)
    }

    fn create_task_checkout(
        &self,
        _repo: &Path,
        dest: &Path,
        _base_branch: &str,
        task_branch: &str,
    ) -> Result<(), ToolError> {
        self.record("create_task_checkout", format!("{}@{task_branch}", dest.display()))?;
        let mut inner = self.inner.lock();
        inner.branches.insert(dest.display().to_string(), task_branch.to_string());
        drop(inner);
        std::fs::create_dir_all(dest).map_err(ToolError::from)
    }

    fn current_branch(&self, worktree: &Path) -> Result<String, ToolError> {
        self.record("current_branch", worktree.display().to_string())?;
        Ok(self
            .inner
            .lock()
            .branches
            .get(&worktree.display().to_string())
            .cloned()
            .unwrap_or_else(|| "main".to_string()))
    }

    fn checkout_branch(&self, worktree: &Path, branch: &str) -> Result<(), ToolError> {
        self.record("checkout_branch", format!("{}@{branch}", worktree.display()))?;
        self.inner.lock().branches.insert(worktree.display().to_string(), branch.to_string());
        Ok(())
    }

    fn push_branch(&self, worktree: &Path, branch: &str) -> Result<(), ToolError> {
        self.record("push_branch", format!("{}@{branch}", worktree.display()))
    }

    fn commits_ahead(&self, worktree: &Path, base_branch: &str) -> Result<u32, ToolError> {
        self.record("commits_ahead", format!("{}..{base_branch}", worktree.display()))?;
        Ok(self.inner.lock().commits_ahead)
    }

    fn rebase_onto(&self, worktree: &Path, base_branch: &str) -> Result<bool, ToolError> {
        self.record("rebase_onto", format!("{}@{base_branch}", worktree.display()))?;
        Ok(self.inner.lock().rebase_ok)
    }

    fn run_tests(&self, worktree: &Path, command: Option<&str>) -> Result<bool, ToolError> {
        self.record("run_tests", format!("{}:{}", worktree.display(), command.unwrap_or("-")))?;
        if command.is_none() {
            return Ok(true);
        }
        Ok(self.inner.lock().tests_pass)
    }

    fn pr_for_branch(&self, _worktree: &Path, branch: &str) -> Result<Option<PrInfo>, ToolError> {
        self.record("pr_for_branch", branch.to_string())?;
        Ok(self.inner.lock().prs.get(branch).cloned())
    }

    fn create_pr(
        &self,
        _worktree: &Path,
        branch: &str,
        base_branch: &str,
        _title: &str,
        _body: &str,
    ) -> Result<PrInfo, ToolError> {
        self.record("create_pr", format!("{branch}->{base_branch}"))?;
        let mut inner = self.inner.lock();
        let number = inner.next_pr_number;
        inner.next_pr_number += 1;
        let pr = PrInfo { number, url: format!("https://example.test/pr/{number}") };
        inner.prs.insert(branch.to_string(), pr.clone());
        Ok(pr)
    }

    fn pr_mergeable(&self, _worktree: &Path, number: u64) -> Result<MergeState, ToolError> {
        self.record("pr_mergeable", number.to_string())?;
        Ok(self.inner.lock().mergeable)
    }

    fn comment_on_pr(&self, _worktree: &Path, number: u64, body: &str) -> Result<(), ToolError> {
        self.record("comment_on_pr", number.to_string())?;
        self.inner.lock().pr_comments.push((number, body.to_string()));
        Ok(())
    }

    fn merge_pr(&self, _worktree: &Path, number: u64) -> Result<(), ToolError> {
        self.record("merge_pr", number.to_string())?;
        self.inner.lock().merged_prs.push(number);
        Ok(())
    }

    fn list_issues(&self, _cwd: &Path) -> Result<Vec<IssueInfo>, ToolError> {
        self.record("list_issues", String::new())?;
        Ok(self.inner.lock().issues.clone())
    }

    fn comment_on_issue(&self, _cwd: &Path, number: u64, body: &str) -> Result<(), ToolError> {
        self.record("comment_on_issue", number.to_string())?;
        self.inner.lock().issue_comments.push((number, body.to_string()));
        Ok(())
    }

    fn spawn_worker(&self, spec: &SpawnSpec) -> Result<i32, ToolError> {
        self.record("spawn_worker", spec.log_stem.clone())?;
        let mut inner = self.inner.lock();
        inner.spawned.push(spec.clone());
        // Default to a certainly-dead PID so the next sweep picks the
        // "worker" up without a real process.
        Ok(inner.spawn_pids.pop_front().unwrap_or(999_999_999))
    }
}
