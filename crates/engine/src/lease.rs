// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lease monitor: requeue claimed tasks whose lease has expired.
//!
//! A lease deadline in the past means the worker lost its claim: the
//! task goes back to `incoming` with the claim cleared. Missing,
//! unparseable, and future leases are skipped. Server errors are
//! swallowed; the next tick retries.

use crate::scheduler::Scheduler;
use crate::tools::WorkTools;
use chrono::{DateTime, Utc};
use fm_client::{ServerClient, TaskPatch};
use fm_core::{Clock, Queue};

pub fn run_lease_monitor<C: Clock, S: ServerClient, T: WorkTools>(s: &Scheduler<C, S, T>) {
    let tasks = match s.client.list_tasks(Some(Queue::Claimed)) {
        Ok(tasks) => tasks,
        Err(e) => {
            tracing::warn!(error = %e, "lease monitor cannot list claimed tasks");
            return;
        }
    };

    let now = s.clock.now_utc();
    for task in tasks {
        let Some(raw) = task.lease_expires_at.as_deref() else {
            continue;
        };
        // Accept both `+00:00` and trailing-`Z` timestamp forms.
        let Ok(expires) = DateTime::parse_from_rfc3339(raw) else {
            tracing::debug!(task_id = %task.id, lease = %raw, "unparseable lease, skipping");
            continue;
        };
        if expires.with_timezone(&Utc) >= now {
            continue;
        }

        tracing::info!(task_id = %task.id, lease = %raw, "lease expired, requeueing");
        let patch = TaskPatch::new().clear_claimed_by().clear_lease();
        if let Err(e) = s.client.update_queue(&task.id, Queue::Incoming, &patch) {
            tracing::warn!(task_id = %task.id, error = %e, "requeue failed, will retry next tick");
        }
    }
}

#[cfg(test)]
#[path = "lease_tests.rs"]
mod tests;
