// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PID tracking per blueprint for the agent pool.
//!
//! Each blueprint can run several concurrent worker instances; their PIDs
//! are tracked in a per-blueprint `running_pids.json` snapshot. Every
//! mutation is appended to a JSONL audit trail for post-incident
//! forensics.
//!
//! Entries for dead PIDs are removed only through
//! [`PoolRegistry::remove_finished`], which the finish sweep calls after
//! the worker's result artifact has been handled. Removing a PID any
//! earlier would orphan its task.

use crate::layout::RuntimeDir;
use crate::{process, snapshot, StorageError};
use fm_core::{BlueprintName, Clock, InstanceName, TaskId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::panic::Location;

/// One tracked worker instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PidEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    pub started_at: String,
    pub instance_name: InstanceName,
}

/// Audit record for a registry mutation.
#[derive(Debug, Serialize)]
struct AuditEntry<'a> {
    ts: String,
    action: &'a str,
    blueprint: &'a str,
    pid: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    task_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    instance_name: Option<&'a str>,
    reason: &'a str,
    caller: String,
    pids_before: Vec<i32>,
    pids_after: Vec<i32>,
}

/// Per-blueprint worker PID registry.
///
/// Only the scheduler process mutates the registry, so no cross-process
/// locking is taken here; snapshot writes are atomic against reader
/// crashes.
#[derive(Debug, Clone)]
pub struct PoolRegistry {
    runtime: RuntimeDir,
}

impl PoolRegistry {
    pub fn new(runtime: RuntimeDir) -> Self {
        Self { runtime }
    }

    /// Load the tracked entries for a blueprint.
    ///
    /// Missing and unreadable files both load as empty; the next save
    /// rewrites the snapshot wholesale.
    pub fn load(&self, blueprint: &BlueprintName) -> BTreeMap<i32, PidEntry> {
        let raw: BTreeMap<String, PidEntry> =
            snapshot::read_json_or_default(&self.runtime.blueprint_pids(blueprint));
        raw.into_iter().filter_map(|(pid, entry)| Some((pid.parse().ok()?, entry))).collect()
    }

    fn save(
        &self,
        blueprint: &BlueprintName,
        pids: &BTreeMap<i32, PidEntry>,
    ) -> Result<(), StorageError> {
        let raw: BTreeMap<String, &PidEntry> =
            pids.iter().map(|(pid, entry)| (pid.to_string(), entry)).collect();
        snapshot::write_json_atomic(&self.runtime.blueprint_pids(blueprint), &raw)
    }

    /// Register a freshly spawned worker. The caller has already verified
    /// the process started.
    #[track_caller]
    pub fn register(
        &self,
        blueprint: &BlueprintName,
        pid: i32,
        task_id: Option<TaskId>,
        instance_name: InstanceName,
        clock: &impl Clock,
    ) -> Result<(), StorageError> {
        let caller = caller_info(Location::caller());
        let mut pids = self.load(blueprint);
        let before = alive_summary(&pids);
        pids.insert(
            pid,
            PidEntry { task_id, started_at: clock.now_rfc3339(), instance_name },
        );
        self.save(blueprint, &pids)?;

        let entry = &pids[&pid];
        self.audit(AuditEntry {
            ts: clock.now_rfc3339(),
            action: "register",
            blueprint: blueprint.as_str(),
            pid,
            task_id: entry.task_id.as_ref().map(|t| t.as_str()),
            instance_name: Some(entry.instance_name.as_str()),
            reason: "agent_spawned",
            caller,
            pids_before: before,
            pids_after: alive_summary(&pids),
        });
        Ok(())
    }

    /// Number of tracked entries whose PID is actually alive.
    ///
    /// Dead PIDs are ignored but not removed here.
    pub fn count_alive(&self, blueprint: &BlueprintName) -> usize {
        self.load(blueprint).keys().filter(|pid| process::alive(**pid)).count()
    }

    /// Task IDs held by entries whose PID is alive.
    pub fn active_task_ids(&self, blueprint: &BlueprintName) -> HashSet<TaskId> {
        self.load(blueprint)
            .iter()
            .filter(|(pid, _)| process::alive(**pid))
            .filter_map(|(_, entry)| entry.task_id.clone())
            .collect()
    }

    /// Remove one entry after its result has been handled.
    ///
    /// This is the only removal path; it exists for the finish sweep.
    /// Returns the removed entry, or `None` if the PID was not tracked.
    #[track_caller]
    pub fn remove_finished(
        &self,
        blueprint: &BlueprintName,
        pid: i32,
        clock: &impl Clock,
    ) -> Result<Option<PidEntry>, StorageError> {
        let caller = caller_info(Location::caller());
        let mut pids = self.load(blueprint);
        let before = alive_summary(&pids);
        let Some(entry) = pids.remove(&pid) else {
            return Ok(None);
        };
        self.save(blueprint, &pids)?;

        self.audit(AuditEntry {
            ts: clock.now_rfc3339(),
            action: "remove_finished",
            blueprint: blueprint.as_str(),
            pid,
            task_id: entry.task_id.as_ref().map(|t| t.as_str()),
            instance_name: Some(entry.instance_name.as_str()),
            reason: "result_processed",
            caller,
            pids_before: before,
            pids_after: alive_summary(&pids),
        });
        Ok(Some(entry))
    }

    /// Append to the audit trail. Audit logging must never crash the
    /// scheduler, so failures are logged and swallowed.
    fn audit(&self, entry: AuditEntry<'_>) {
        let result = (|| -> Result<(), StorageError> {
            let path = self.runtime.pid_audit();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut file = std::fs::OpenOptions::new().append(true).create(true).open(&path)?;
            let line = serde_json::to_string(&entry)?;
            writeln!(file, "{line}")?;
            Ok(())
        })();
        if let Err(e) = result {
            tracing::warn!(error = %e, "pid audit append failed");
        }
    }
}

/// Sorted list of alive tracked PIDs (compact representation for audit).
fn alive_summary(pids: &BTreeMap<i32, PidEntry>) -> Vec<i32> {
    pids.keys().copied().filter(|pid| process::alive(*pid)).collect()
}

fn caller_info(location: &Location<'_>) -> String {
    format!("{}:{}", location.file(), location.line())
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
