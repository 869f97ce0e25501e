// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-instance worker state records.

use crate::clock::Clock;
use crate::ids::TaskId;
use serde::{Deserialize, Serialize};

/// State of one worker instance, persisted as `state.json` in the
/// instance directory.
///
/// Transitions go through [`InstanceState::mark_started`] and
/// [`InstanceState::mark_finished`], which return a fresh record rather
/// than mutating in place so callers can persist before-and-after.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceState {
    #[serde(default)]
    pub running: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<i32>,
    /// RFC 3339 timestamps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_started: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_finished: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_exit_code: Option<i32>,
    #[serde(default)]
    pub consecutive_failures: u32,
    #[serde(default)]
    pub total_runs: u32,
    #[serde(default)]
    pub total_successes: u32,
    #[serde(default)]
    pub total_failures: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_task: Option<TaskId>,
}

impl InstanceState {
    /// Record a successful launch.
    pub fn mark_started(
        &self,
        pid: i32,
        task_id: Option<TaskId>,
        clock: &impl Clock,
    ) -> InstanceState {
        InstanceState {
            running: true,
            pid: Some(pid),
            last_started: Some(clock.now_rfc3339()),
            last_finished: self.last_finished.clone(),
            last_exit_code: self.last_exit_code,
            consecutive_failures: self.consecutive_failures,
            total_runs: self.total_runs + 1,
            total_successes: self.total_successes,
            total_failures: self.total_failures,
            current_task: task_id,
        }
    }

    /// Record a finished worker with the given exit code.
    pub fn mark_finished(&self, exit_code: i32, clock: &impl Clock) -> InstanceState {
        let success = exit_code == 0;
        InstanceState {
            running: false,
            pid: None,
            last_started: self.last_started.clone(),
            last_finished: Some(clock.now_rfc3339()),
            last_exit_code: Some(exit_code),
            consecutive_failures: if success { 0 } else { self.consecutive_failures + 1 },
            total_runs: self.total_runs,
            total_successes: self.total_successes + u32::from(success),
            total_failures: self.total_failures + u32::from(!success),
            current_task: None,
        }
    }

    /// Whether the instance is due to run again given its interval.
    ///
    /// Never-run and unparseable-timestamp states are both due.
    pub fn is_due(&self, interval_seconds: u64, clock: &impl Clock) -> bool {
        let Some(last_started) = self.last_started.as_deref() else {
            return true;
        };
        match chrono::DateTime::parse_from_rfc3339(last_started) {
            Ok(started) => {
                let elapsed_ms = clock.epoch_ms() as i64 - started.timestamp_millis();
                elapsed_ms >= (interval_seconds as i64) * 1000
            }
            Err(_) => true,
        }
    }
}

#[cfg(test)]
#[path = "instance_tests.rs"]
mod tests;
