// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Work tools: git, GitHub, and worker processes.
//!
//! The engine treats git and gh as shell tools with defined exit codes
//! and the worker as an opaque subprocess. [`WorkTools`] is the seam:
//! [`ShellTools`] shells out for real, and the fake implementation (test
//! support) records calls and returns scripted results.

use crate::shell::{self, CmdOutput};
use serde::Deserialize;
use std::fs::File;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;
use thiserror::Error;

/// Error from a tool invocation
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ToolError(pub String);

impl From<std::io::Error> for ToolError {
    fn from(e: std::io::Error) -> Self {
        ToolError(e.to_string())
    }
}

/// Mergeability of a pull request, as reported by the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergeState {
    Mergeable,
    Conflicting,
    #[default]
    Unknown,
}

/// An existing or freshly created pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrInfo {
    pub number: u64,
    pub url: String,
}

/// An open issue on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueInfo {
    pub number: u64,
    pub title: String,
    pub url: String,
    pub body: String,
    pub labels: Vec<String>,
}

/// Everything needed to launch one worker subprocess.
#[derive(Debug, Clone)]
pub struct SpawnSpec {
    /// Shell command line for the worker.
    pub command: String,
    pub workdir: std::path::PathBuf,
    pub env: Vec<(String, String)>,
    /// Directory receiving the worker's stdout/stderr logs.
    pub log_dir: std::path::PathBuf,
    /// Log file stem, conventionally the instance name.
    pub log_stem: String,
}

/// Shell-tool seam for the engine.
pub trait WorkTools {
    /// Create (or reuse) a long-lived worktree on `branch` based on
    /// `base_branch`.
    fn ensure_worktree(
        &self,
        repo: &Path,
        dest: &Path,
        base_branch: &str,
        branch: &str,
    ) -> Result<(), ToolError>;

    /// Create (or reuse) a per-task checkout, left on the named task
    /// branch so a later push has a branch to push.
    fn create_task_checkout(
        &self,
        repo: &Path,
        dest: &Path,
        base_branch: &str,
        task_branch: &str,
    ) -> Result<(), ToolError>;

    fn current_branch(&self, worktree: &Path) -> Result<String, ToolError>;

    fn checkout_branch(&self, worktree: &Path, branch: &str) -> Result<(), ToolError>;

    /// Push `branch` to origin. "Everything up-to-date" is success.
    fn push_branch(&self, worktree: &Path, branch: &str) -> Result<(), ToolError>;

    fn commits_ahead(&self, worktree: &Path, base_branch: &str) -> Result<u32, ToolError>;

    /// Rebase the checked-out branch onto `origin/<base_branch>`.
    /// Returns `false` (after aborting) on conflict.
    fn rebase_onto(&self, worktree: &Path, base_branch: &str) -> Result<bool, ToolError>;

    /// Run the configured test command. `None` means no tests are
    /// configured, which passes.
    fn run_tests(&self, worktree: &Path, command: Option<&str>) -> Result<bool, ToolError>;

    fn pr_for_branch(&self, worktree: &Path, branch: &str) -> Result<Option<PrInfo>, ToolError>;

    fn create_pr(
        &self,
        worktree: &Path,
        branch: &str,
        base_branch: &str,
        title: &str,
        body: &str,
    ) -> Result<PrInfo, ToolError>;

    fn pr_mergeable(&self, worktree: &Path, number: u64) -> Result<MergeState, ToolError>;

    fn comment_on_pr(&self, worktree: &Path, number: u64, body: &str) -> Result<(), ToolError>;

    /// Merge a pull request; a non-zero exit from the merge tool is an
    /// error the caller propagates.
    fn merge_pr(&self, worktree: &Path, number: u64) -> Result<(), ToolError>;

    fn list_issues(&self, cwd: &Path) -> Result<Vec<IssueInfo>, ToolError>;

    fn comment_on_issue(&self, cwd: &Path, number: u64, body: &str) -> Result<(), ToolError>;

    /// Launch a detached worker; returns its PID.
    fn spawn_worker(&self, spec: &SpawnSpec) -> Result<i32, ToolError>;
}

const GIT_TIMEOUT: Duration = Duration::from_secs(120);
const GH_TIMEOUT: Duration = Duration::from_secs(30);
const TEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Real tools: shells out to `git` and `gh`, spawns workers via `sh -c`.
#[derive(Debug, Clone, Default)]
pub struct ShellTools;

impl ShellTools {
    fn git(cwd: &Path, args: &[&str]) -> Result<CmdOutput, ToolError> {
        Ok(shell::run("git", args, cwd, GIT_TIMEOUT)?)
    }

    fn git_ok(cwd: &Path, args: &[&str]) -> Result<CmdOutput, ToolError> {
        let out = Self::git(cwd, args)?;
        if !out.success() {
            return Err(ToolError(format!(
                "git {} failed: {}",
                args.first().unwrap_or(&""),
                out.stderr.trim()
            )));
        }
        Ok(out)
    }

    fn gh(cwd: &Path, args: &[&str]) -> Result<CmdOutput, ToolError> {
        Ok(shell::run("gh", args, cwd, GH_TIMEOUT)?)
    }

    fn gh_ok(cwd: &Path, args: &[&str]) -> Result<CmdOutput, ToolError> {
        let out = Self::gh(cwd, args)?;
        if !out.success() {
            return Err(ToolError(format!(
                "gh {} failed: {}",
                args.first().unwrap_or(&""),
                out.stderr.trim()
            )));
        }
        Ok(out)
    }
}

#[derive(Deserialize)]
struct RawPr {
    number: u64,
    url: String,
}

#[derive(Deserialize)]
struct RawLabel {
    name: String,
}

#[derive(Deserialize)]
struct RawIssue {
    number: u64,
    title: String,
    url: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    labels: Vec<RawLabel>,
}

impl WorkTools for ShellTools {
    fn ensure_worktree(
        &self,
        repo: &Path,
        dest: &Path,
        base_branch: &str,
        branch: &str,
    ) -> Result<(), ToolError> {
        if dest.join(".git").exists() {
            return Ok(());
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(ToolError::from)?;
        }
        let dest_str = dest.to_string_lossy();
        Self::git_ok(
            repo,
            &["worktree", "add", "-B", branch, dest_str.as_ref(), base_branch],
        )?;
        Ok(())
    }

    fn create_task_checkout(
        &self,
        repo: &Path,
        dest: &Path,
        base_branch: &str,
        task_branch: &str,
    ) -> Result<(), ToolError> {
        // Same mechanics as ensure_worktree; kept separate because the
        // branch naming contract differs (agent/<task_id>).
        self.ensure_worktree(repo, dest, base_branch, task_branch)
    }

    fn current_branch(&self, worktree: &Path) -> Result<String, ToolError> {
        let out = Self::git_ok(worktree, &["branch", "--show-current"])?;
        Ok(out.stdout.trim().to_string())
    }

    fn checkout_branch(&self, worktree: &Path, branch: &str) -> Result<(), ToolError> {
        Self::git_ok(worktree, &["checkout", "-B", branch])?;
        Ok(())
    }

    fn push_branch(&self, worktree: &Path, branch: &str) -> Result<(), ToolError> {
        Self::git_ok(worktree, &["push", "--set-upstream", "origin", branch])?;
        Ok(())
    }

    fn commits_ahead(&self, worktree: &Path, base_branch: &str) -> Result<u32, ToolError> {
        let _ = Self::git(worktree, &["fetch", "origin", base_branch]);
        let range = format!("origin/{base_branch}..HEAD");
        let out = Self::git_ok(worktree, &["rev-list", "--count", &range])?;
        out.stdout
            .trim()
            .parse()
            .map_err(|_| ToolError(format!("unparseable rev-list output: {}", out.stdout.trim())))
    }

    fn rebase_onto(&self, worktree: &Path, base_branch: &str) -> Result<bool, ToolError> {
        let _ = Self::git(worktree, &["fetch", "origin", base_branch]);
        let target = format!("origin/{base_branch}");
        let out = Self::git(worktree, &["rebase", &target])?;
        if out.success() {
            return Ok(true);
        }
        let _ = Self::git(worktree, &["rebase", "--abort"]);
        Ok(false)
    }

    fn run_tests(&self, worktree: &Path, command: Option<&str>) -> Result<bool, ToolError> {
        let Some(command) = command else {
            return Ok(true);
        };
        let out = shell::run("sh", &["-c", command], worktree, TEST_TIMEOUT)?;
        Ok(out.success())
    }

    fn pr_for_branch(&self, worktree: &Path, branch: &str) -> Result<Option<PrInfo>, ToolError> {
        let out = Self::gh_ok(
            worktree,
            &["pr", "list", "--head", branch, "--json", "number,url", "--limit", "1"],
        )?;
        let prs: Vec<RawPr> = serde_json::from_str(&out.stdout)
            .map_err(|e| ToolError(format!("unparseable gh pr list output: {e}")))?;
        Ok(prs.into_iter().next().map(|pr| PrInfo { number: pr.number, url: pr.url }))
    }

    fn create_pr(
        &self,
        worktree: &Path,
        branch: &str,
        base_branch: &str,
        title: &str,
        body: &str,
    ) -> Result<PrInfo, ToolError> {
        Self::gh_ok(
            worktree,
            &[
                "pr", "create", "--head", branch, "--base", base_branch, "--title", title,
                "--body", body,
            ],
        )?;
        self.pr_for_branch(worktree, branch)?
            .ok_or_else(|| ToolError(format!("PR for {branch} not found after create")))
    }

    fn pr_mergeable(&self, worktree: &Path, number: u64) -> Result<MergeState, ToolError> {
        let number = number.to_string();
        let out = Self::gh_ok(worktree, &["pr", "view", &number, "--json", "mergeable"])?;
        #[derive(Deserialize)]
        struct Mergeable {
            mergeable: String,
        }
        let parsed: Mergeable = serde_json::from_str(&out.stdout)
            .map_err(|e| ToolError(format!("unparseable gh pr view output: {e}")))?;
        Ok(match parsed.mergeable.as_str() {
            "MERGEABLE" => MergeState::Mergeable,
            "CONFLICTING" => MergeState::Conflicting,
            _ => MergeState::Unknown,
        })
    }

    fn comment_on_pr(&self, worktree: &Path, number: u64, body: &str) -> Result<(), ToolError> {
        let number = number.to_string();
        Self::gh_ok(worktree, &["pr", "comment", &number, "--body", body])?;
        Ok(())
    }

    fn merge_pr(&self, worktree: &Path, number: u64) -> Result<(), ToolError> {
        let number = number.to_string();
        Self::gh_ok(worktree, &["pr", "merge", &number, "--merge"])?;
        Ok(())
    }

    fn list_issues(&self, cwd: &Path) -> Result<Vec<IssueInfo>, ToolError> {
        let out = Self::gh_ok(
            cwd,
            &[
                "issue", "list", "--state", "open", "--json", "number,title,url,body,labels",
                "--limit", "100",
            ],
        )?;
        let raw: Vec<RawIssue> = serde_json::from_str(&out.stdout)
            .map_err(|e| ToolError(format!("unparseable gh issue list output: {e}")))?;
        Ok(raw
            .into_iter()
            .map(|issue| IssueInfo {
                number: issue.number,
                title: issue.title,
                url: issue.url,
                body: issue.body.unwrap_or_default(),
                labels: issue.labels.into_iter().map(|l| l.name).collect(),
            })
            .collect())
    }

    fn comment_on_issue(&self, cwd: &Path, number: u64, body: &str) -> Result<(), ToolError> {
        let number = number.to_string();
        Self::gh_ok(cwd, &["issue", "comment", &number, "--body", body])?;
        Ok(())
    }

    fn spawn_worker(&self, spec: &SpawnSpec) -> Result<i32, ToolError> {
        std::fs::create_dir_all(&spec.log_dir).map_err(ToolError::from)?;
        std::fs::create_dir_all(&spec.workdir).map_err(ToolError::from)?;
        let stdout = File::create(spec.log_dir.join(format!("{}.out.log", spec.log_stem)))
            .map_err(ToolError::from)?;
        let stderr = File::create(spec.log_dir.join(format!("{}.err.log", spec.log_stem)))
            .map_err(ToolError::from)?;

        // Workers detach into their own process group so they survive a
        // scheduler restart.
        let child = Command::new("sh")
            .arg("-c")
            .arg(&spec.command)
            .current_dir(&spec.workdir)
            .envs(spec.env.iter().cloned())
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .process_group(0)
            .spawn()
            .map_err(ToolError::from)?;
        Ok(child.id() as i32)
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake;
