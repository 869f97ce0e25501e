// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory server for tests.
//!
//! Implements the full [`ServerClient`] contract with the same queue and
//! lease invariants as the real server, driven by a [`FakeClock`] so
//! integration tests never sleep. Gated behind the `test-support`
//! feature.

use crate::types::{
    ActionRecord, ClaimParams, NewTask, OrchestratorInfo, PollData, ProjectStatus, TaskPatch,
};
use crate::{ClientError, ServerClient};
use fm_core::{Clock, FakeClock, OrchestratorId, Priority, Queue, Task, TaskId};
use parking_lot::Mutex;
use std::collections::BTreeMap;

const DEFAULT_LEASE_SECONDS: u64 = 900;

/// Terminal state of a dispatched action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionState {
    Completed(serde_json::Value),
    Failed(String),
}

#[derive(Default)]
struct Inner {
    tasks: BTreeMap<String, Task>,
    feedback: BTreeMap<String, Vec<String>>,
    actions: Vec<ActionRecord>,
    action_states: BTreeMap<String, ActionState>,
    active_projects: Vec<ProjectStatus>,
    registered: bool,
    register_calls: u32,
    heartbeats: u32,
    failing: bool,
    task_seq: u64,
}

/// In-memory task server.
pub struct FakeServer {
    clock: FakeClock,
    inner: Mutex<Inner>,
}

impl FakeServer {
    pub fn new(clock: FakeClock) -> FakeServer {
        FakeServer { clock, inner: Mutex::new(Inner::default()) }
    }

    /// Make every subsequent call fail with a transport error, to
    /// exercise the log-and-skip paths.
    pub fn set_failing(&self, failing: bool) {
        self.inner.lock().failing = failing;
    }

    /// Insert a task as-is (tests construct arbitrary states).
    pub fn insert(&self, task: Task) {
        self.inner.lock().tasks.insert(task.id.as_str().to_string(), task);
    }

    /// Snapshot of a task by id.
    pub fn task(&self, id: &TaskId) -> Option<Task> {
        self.inner.lock().tasks.get(id.as_str()).cloned()
    }

    /// Feedback lines recorded by `reject` for a task.
    pub fn feedback_for(&self, id: &TaskId) -> Vec<String> {
        self.inner.lock().feedback.get(id.as_str()).cloned().unwrap_or_default()
    }

    /// Queue an externally requested action.
    pub fn push_action(&self, action: ActionRecord) {
        self.inner.lock().actions.push(action);
    }

    /// Terminal state recorded for an action, if any.
    pub fn action_state(&self, id: &str) -> Option<ActionState> {
        self.inner.lock().action_states.get(id).cloned()
    }

    /// Configure the projects reported by `poll`.
    pub fn set_active_projects(&self, projects: Vec<ProjectStatus>) {
        self.inner.lock().active_projects = projects;
    }

    pub fn register_calls(&self) -> u32 {
        self.inner.lock().register_calls
    }

    pub fn heartbeats(&self) -> u32 {
        self.inner.lock().heartbeats
    }

    fn check_failing(&self) -> Result<(), ClientError> {
        if self.inner.lock().failing {
            return Err(ClientError::Transport("injected failure".to_string()));
        }
        Ok(())
    }

    fn unblock_dependents(tasks: &mut BTreeMap<String, Task>) {
        let done: Vec<TaskId> = tasks
            .values()
            .filter(|t| t.queue == Queue::Done)
            .map(|t| t.id.clone())
            .collect();
        for task in tasks.values_mut() {
            if !task.blocked_by.is_empty() && task.blocked_by.iter().all(|b| done.contains(b)) {
                task.blocked_by.clear();
            }
        }
    }
}

impl ServerClient for FakeServer {
    fn list_tasks(&self, queue: Option<Queue>) -> Result<Vec<Task>, ClientError> {
        self.check_failing()?;
        let inner = self.inner.lock();
        Ok(inner
            .tasks
            .values()
            .filter(|t| queue.map(|q| t.queue == q).unwrap_or(true))
            .cloned()
            .collect())
    }

    fn get_task(&self, id: &TaskId) -> Result<Option<Task>, ClientError> {
        self.check_failing()?;
        Ok(self.inner.lock().tasks.get(id.as_str()).cloned())
    }

    fn create_task(&self, new_task: &NewTask) -> Result<Task, ClientError> {
        self.check_failing()?;
        let mut inner = self.inner.lock();
        inner.task_seq += 1;
        let id = TaskId::new(format!("T-{:04}", inner.task_seq));
        let task: Task = serde_json::from_value(serde_json::json!({
            "id": id.as_str(),
            "title": new_task.title.clone(),
            "description": new_task.description.clone(),
            "role": new_task.role.clone(),
            "priority": new_task.priority,
            "queue": "incoming",
            "branch": new_task.branch.clone().unwrap_or_else(|| "main".to_string()),
        }))?;
        inner.tasks.insert(id.as_str().to_string(), task.clone());
        Ok(task)
    }

    fn update_task(&self, id: &TaskId, patch: &TaskPatch) -> Result<(), ClientError> {
        self.check_failing()?;
        let mut inner = self.inner.lock();
        let task =
            inner.tasks.get_mut(id.as_str()).ok_or_else(|| ClientError::NotFound(id.clone()))?;
        patch.apply_to(task);
        Ok(())
    }

    fn update_queue(
        &self,
        id: &TaskId,
        queue: Queue,
        patch: &TaskPatch,
    ) -> Result<(), ClientError> {
        self.check_failing()?;
        let mut inner = self.inner.lock();
        let task =
            inner.tasks.get_mut(id.as_str()).ok_or_else(|| ClientError::NotFound(id.clone()))?;
        task.queue = queue;
        patch.apply_to(task);
        if queue != Queue::Claimed {
            task.claimed_by = None;
            task.lease_expires_at = None;
        }
        Ok(())
    }

    fn claim_task(&self, params: &ClaimParams<'_>) -> Result<Option<Task>, ClientError> {
        self.check_failing()?;
        let now = self.clock.now_utc();
        let mut inner = self.inner.lock();

        let mut claimable: Vec<&Task> = inner
            .tasks
            .values()
            .filter(|t| {
                t.queue == Queue::Incoming && !t.is_blocked() && t.role == params.role_filter
            })
            .collect();
        claimable.sort_by_key(|t| (t.priority, t.id.as_str().to_string()));
        let Some(id) = claimable.first().map(|t| t.id.as_str().to_string()) else {
            return Ok(None);
        };

        let lease_seconds = params.lease_duration_seconds.unwrap_or(DEFAULT_LEASE_SECONDS);
        let lease = now + chrono::Duration::seconds(lease_seconds as i64);
        let task = inner
            .tasks
            .get_mut(&id)
            .ok_or_else(|| ClientError::NotFound(TaskId::new(id.clone())))?;
        task.queue = Queue::Claimed;
        task.claimed_by = Some(params.agent_name.clone());
        task.lease_expires_at = Some(lease.to_rfc3339());
        Ok(Some(task.clone()))
    }

    fn submit_raw(
        &self,
        id: &TaskId,
        commits_count: u32,
        turns_used: u32,
    ) -> Result<(), ClientError> {
        self.check_failing()?;
        let mut inner = self.inner.lock();
        let task =
            inner.tasks.get_mut(id.as_str()).ok_or_else(|| ClientError::NotFound(id.clone()))?;
        if task.queue != Queue::Claimed {
            return Err(ClientError::WrongQueue {
                id: id.clone(),
                queue: task.queue,
                expected: Queue::Claimed,
            });
        }
        task.queue = Queue::Provisional;
        task.commits_count = commits_count;
        task.turns_used = Some(turns_used);
        task.claimed_by = None;
        task.lease_expires_at = None;
        Ok(())
    }

    fn accept_task(&self, id: &TaskId, _accepted_by: &str) -> Result<(), ClientError> {
        self.check_failing()?;
        let mut inner = self.inner.lock();
        let task =
            inner.tasks.get_mut(id.as_str()).ok_or_else(|| ClientError::NotFound(id.clone()))?;
        task.queue = Queue::Done;
        task.claimed_by = None;
        task.lease_expires_at = None;
        Self::unblock_dependents(&mut inner.tasks);
        Ok(())
    }

    fn reject_task(
        &self,
        id: &TaskId,
        reason: &str,
        feedback: Option<&str>,
    ) -> Result<(), ClientError> {
        self.check_failing()?;
        let mut inner = self.inner.lock();
        let task =
            inner.tasks.get_mut(id.as_str()).ok_or_else(|| ClientError::NotFound(id.clone()))?;
        task.queue = Queue::Incoming;
        task.claimed_by = None;
        task.lease_expires_at = None;
        task.attempt_count += 1;
        if feedback.is_some() {
            task.rejection_count += 1;
        }
        let mut lines = vec![format!("rejected: {reason}")];
        if let Some(feedback) = feedback {
            lines.push(feedback.to_string());
        }
        inner.feedback.entry(id.as_str().to_string()).or_default().extend(lines);
        Ok(())
    }

    fn register_orchestrator(&self, _info: &OrchestratorInfo) -> Result<(), ClientError> {
        self.check_failing()?;
        let mut inner = self.inner.lock();
        inner.registered = true;
        inner.register_calls += 1;
        Ok(())
    }

    fn heartbeat(&self, _id: &OrchestratorId) -> Result<(), ClientError> {
        self.check_failing()?;
        self.inner.lock().heartbeats += 1;
        Ok(())
    }

    fn list_actions(&self, _status: &str) -> Result<Vec<ActionRecord>, ClientError> {
        self.check_failing()?;
        let inner = self.inner.lock();
        Ok(inner
            .actions
            .iter()
            .filter(|a| !inner.action_states.contains_key(&a.id))
            .cloned()
            .collect())
    }

    fn complete_action(&self, id: &str, result: &serde_json::Value) -> Result<(), ClientError> {
        self.check_failing()?;
        self.inner
            .lock()
            .action_states
            .insert(id.to_string(), ActionState::Completed(result.clone()));
        Ok(())
    }

    fn fail_action(&self, id: &str, error: &str) -> Result<(), ClientError> {
        self.check_failing()?;
        self.inner
            .lock()
            .action_states
            .insert(id.to_string(), ActionState::Failed(error.to_string()));
        Ok(())
    }

    fn poll(&self) -> Result<PollData, ClientError> {
        self.check_failing()?;
        let inner = self.inner.lock();
        let mut queue_counts = BTreeMap::new();
        for task in inner.tasks.values() {
            *queue_counts.entry(task.queue.to_string()).or_insert(0) += 1;
        }
        Ok(PollData {
            queue_counts,
            orchestrator_registered: inner.registered,
            provisional_tasks: inner
                .tasks
                .values()
                .filter(|t| t.queue == Queue::Provisional)
                .cloned()
                .collect(),
            active_projects: inner.active_projects.clone(),
        })
    }
}

impl FakeServer {
    /// Convenience: seed an incoming task with the given id and role.
    pub fn seed_incoming(&self, id: &str, role: &str) -> Task {
        let task: Task = match serde_json::from_value(serde_json::json!({
            "id": id,
            "title": id,
            "description": format!("work on {id}"),
            "role": role,
            "priority": Priority::High,
            "queue": "incoming",
        })) {
            Ok(task) => task,
            Err(_) => unreachable!("static task shape"),
        };
        self.insert(task.clone());
        task
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
