// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task record and its state-machine vocabulary.

use crate::ids::{InstanceName, TaskId};
use serde::{Deserialize, Serialize};

/// The queue a task sits in: its state-machine state, not a message queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Queue {
    Incoming,
    Claimed,
    Provisional,
    Done,
    Failed,
    NeedsContinuation,
}

impl Queue {
    /// Terminal queues are never advanced by the engine.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Queue::Done | Queue::Failed)
    }

    /// Parse a queue name as it appears in flow definitions.
    pub fn parse(s: &str) -> Option<Queue> {
        match s {
            "incoming" => Some(Queue::Incoming),
            "claimed" => Some(Queue::Claimed),
            "provisional" => Some(Queue::Provisional),
            "done" => Some(Queue::Done),
            "failed" => Some(Queue::Failed),
            "needs_continuation" => Some(Queue::NeedsContinuation),
            _ => None,
        }
    }
}

crate::simple_display! {
    Queue {
        Incoming => "incoming",
        Claimed => "claimed",
        Provisional => "provisional",
        Done => "done",
        Failed => "failed",
        NeedsContinuation => "needs_continuation",
    }
}

/// Task priority, ordered highest-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Highest,
    High,
    Low,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::High
    }
}

crate::simple_display! {
    Priority {
        Highest => "highest",
        High => "high",
        Low => "low",
    }
}

/// A named check recorded against a task, with its latest result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCheck {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

/// The unit of work, as stored by the task server.
///
/// The scheduler never persists task bodies itself; this record is the
/// wire shape exchanged with the server. `claimed_by` and
/// `lease_expires_at` are both set iff `queue == Claimed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Role tag naming which blueprint of worker claims this task.
    pub role: String,
    #[serde(default)]
    pub priority: Priority,
    pub queue: Queue,
    /// Target branch for the work.
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Tasks that must be `done` before this one becomes claimable.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocked_by: Vec<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_by: Option<InstanceName>,
    /// RFC 3339 lease deadline; both `+00:00` and `Z` suffixes occur.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_expires_at: Option<String>,
    #[serde(default)]
    pub commits_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turns_used: Option<u32>,
    #[serde(default)]
    pub attempt_count: u32,
    #[serde(default)]
    pub rejection_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staging_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub checks: Vec<TaskCheck>,
    /// Parent project, referenced by identifier only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Name of the flow driving this task's lifecycle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow: Option<String>,
    /// Declared in the data model; the engine always requires explicit
    /// gatekeeper approval regardless of this flag.
    #[serde(default)]
    pub auto_accept: bool,
    /// Set after repeated zero-commit resubmissions so the next worker
    /// sees the history.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_banner: Option<String>,
}

fn default_branch() -> String {
    "main".to_string()
}

impl Task {
    /// A task with unsatisfied blockers is never picked by `claim`.
    pub fn is_blocked(&self) -> bool {
        !self.blocked_by.is_empty()
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
