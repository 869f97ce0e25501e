// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire types for the server contract.

use fm_core::{InstanceName, OrchestratorId, Priority, Task, TaskId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parameters for an atomic claim.
#[derive(Debug, Clone, Serialize)]
pub struct ClaimParams<'a> {
    pub orchestrator_id: &'a OrchestratorId,
    pub agent_name: &'a InstanceName,
    pub role_filter: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease_duration_seconds: Option<u64>,
}

/// Payload for `tasks.create`. New tasks land in `incoming`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub role: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

/// Partial task update.
///
/// Double-`Option` fields distinguish "leave unchanged" (outer `None`)
/// from "set to null" (inner `None`). There is deliberately no queue
/// field here.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimed_by: Option<Option<InstanceName>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease_expires_at: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staging_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_banner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_by: Option<Vec<TaskId>>,
}

impl TaskPatch {
    pub fn new() -> TaskPatch {
        TaskPatch::default()
    }

    pub fn is_empty(&self) -> bool {
        self.claimed_by.is_none()
            && self.lease_expires_at.is_none()
            && self.pr_number.is_none()
            && self.pr_url.is_none()
            && self.staging_url.is_none()
            && self.rejection_banner.is_none()
            && self.blocked_by.is_none()
    }

    /// Clear the claim (set `claimed_by` to null).
    pub fn clear_claimed_by(mut self) -> TaskPatch {
        self.claimed_by = Some(None);
        self
    }

    /// Clear the lease (set `lease_expires_at` to null).
    pub fn clear_lease(mut self) -> TaskPatch {
        self.lease_expires_at = Some(None);
        self
    }

    pub fn pr(mut self, number: u64, url: impl Into<String>) -> TaskPatch {
        self.pr_number = Some(number);
        self.pr_url = Some(url.into());
        self
    }

    pub fn staging_url(mut self, url: impl Into<String>) -> TaskPatch {
        self.staging_url = Some(url.into());
        self
    }

    pub fn rejection_banner(mut self, banner: impl Into<String>) -> TaskPatch {
        self.rejection_banner = Some(banner.into());
        self
    }

    /// Clear the blocker list (all prerequisites satisfied).
    pub fn clear_blocked_by(mut self) -> TaskPatch {
        self.blocked_by = Some(Vec::new());
        self
    }

    /// Apply this patch to a task record (shared by the fake server and
    /// tests asserting patch semantics).
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(claimed_by) = &self.claimed_by {
            task.claimed_by = claimed_by.clone();
        }
        if let Some(lease) = &self.lease_expires_at {
            task.lease_expires_at = lease.clone();
        }
        if let Some(pr_number) = self.pr_number {
            task.pr_number = Some(pr_number);
        }
        if let Some(pr_url) = &self.pr_url {
            task.pr_url = Some(pr_url.clone());
        }
        if let Some(staging_url) = &self.staging_url {
            task.staging_url = Some(staging_url.clone());
        }
        if let Some(banner) = &self.rejection_banner {
            task.rejection_banner = Some(banner.clone());
        }
        if let Some(blocked_by) = &self.blocked_by {
            task.blocked_by = blocked_by.clone();
        }
    }
}

/// Result of [`crate::ServerClient::submit_task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Task moved to `provisional`.
    Submitted,
    /// Zero-commit resubmission short-circuited back to `incoming`.
    AutoRejected,
}

/// Registration payload for `orchestrators.register`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorInfo {
    pub id: OrchestratorId,
    pub hostname: String,
    pub project_root: String,
    pub version: String,
}

/// An externally requested action awaiting dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub id: String,
    pub action_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Per-project child progress, as computed by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectStatus {
    pub id: String,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default = "default_base_branch")]
    pub base_branch: String,
    /// The project's own task, if it has one (the target of the
    /// `children_complete` transition).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_task_id: Option<TaskId>,
    pub children_total: u64,
    pub children_done: u64,
}

fn default_base_branch() -> String {
    "main".to_string()
}

impl ProjectStatus {
    pub fn children_complete(&self) -> bool {
        self.children_total > 0 && self.children_done == self.children_total
    }
}

/// Batched poll payload: fetched once per tick and passed to all due
/// remote jobs so none of them re-queries the server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PollData {
    #[serde(default)]
    pub queue_counts: BTreeMap<String, u64>,
    #[serde(default)]
    pub orchestrator_registered: bool,
    #[serde(default)]
    pub provisional_tasks: Vec<Task>,
    #[serde(default)]
    pub active_projects: Vec<ProjectStatus>,
}

impl PollData {
    pub fn queue_count(&self, queue: &str) -> u64 {
        self.queue_counts.get(queue).copied().unwrap_or(0)
    }
}
