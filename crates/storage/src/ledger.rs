// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Housekeeping-job run ledger.
//!
//! `scheduler_state.json` maps each housekeeping job name to the epoch
//! milliseconds of its last run. A job is due when `now - last_run >=
//! interval`; never-run jobs are always due.

use crate::layout::RuntimeDir;
use crate::{snapshot, StorageError};
use fm_core::Clock;
use std::collections::BTreeMap;

/// In-memory ledger of job last-run times.
///
/// Loaded once per tick, mutated as jobs run, saved once at the end.
#[derive(Debug, Default)]
pub struct SchedulerLedger {
    runs: BTreeMap<String, u64>,
}

impl SchedulerLedger {
    /// Load the ledger from the runtime directory.
    pub fn load(runtime: &RuntimeDir) -> SchedulerLedger {
        SchedulerLedger { runs: snapshot::read_json_or_default(&runtime.scheduler_state()) }
    }

    /// Whether a job is due to run.
    pub fn is_due(&self, name: &str, interval_seconds: u64, clock: &impl Clock) -> bool {
        match self.runs.get(name) {
            None => true,
            Some(last_run) => {
                clock.epoch_ms().saturating_sub(*last_run) >= interval_seconds * 1000
            }
        }
    }

    /// Record that a job ran now. Recorded regardless of the job's
    /// success, so a crashing job cannot run hot every tick.
    pub fn record_run(&mut self, name: &str, clock: &impl Clock) {
        self.runs.insert(name.to_string(), clock.epoch_ms());
    }

    /// Persist the ledger.
    pub fn save(&self, runtime: &RuntimeDir) -> Result<(), StorageError> {
        snapshot::write_json_atomic(&runtime.scheduler_state(), &self.runs)
    }
}

#[cfg(test)]
#[path = "ledger_tests.rs"]
mod tests;
