// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Housekeeping-job dispatcher.
//!
//! Jobs are declared in jobs.yaml and gated by the per-job interval
//! ledger. Local jobs run first without server data; if any remote job
//! is due, the single batched poll fetched by the tick is shared across
//! all of them so none re-queries the server. A crashing job is logged
//! and never prevents later jobs in the same tick from running, and its
//! run timestamp is recorded regardless so it cannot run hot.

use crate::scheduler::Scheduler;
use crate::tools::WorkTools;
use crate::{jobs, spawn, EngineError};
use fm_client::{PollData, ServerClient};
use fm_core::{AgentBlueprint, Clock, SpawnMode};
use fm_playbook::{JobDef, JobGroup, JobType};
use fm_storage::SchedulerLedger;
use std::collections::BTreeMap;

/// Context passed to each job function.
pub struct JobCtx<'a> {
    /// Shared batched poll; `None` for local jobs and when the poll
    /// failed this tick.
    pub poll: Option<&'a PollData>,
    /// The job's extra YAML configuration.
    pub config: &'a BTreeMap<String, serde_yaml::Value>,
}

pub type JobFn<C, S, T> =
    fn(&Scheduler<C, S, T>, &JobCtx<'_>) -> Result<(), EngineError>;

/// Script-job registry. String keys are required by jobs.yaml.
pub fn script_jobs<C: Clock, S: ServerClient, T: WorkTools>(
) -> Vec<(&'static str, JobFn<C, S, T>)> {
    vec![
        ("lease_monitor", jobs::lease_monitor),
        ("orchestrator_register", jobs::orchestrator_register),
        ("heartbeat", jobs::heartbeat),
        ("project_completion_check", jobs::project_completion_check),
        ("queue_health", jobs::queue_health),
        ("github_issue_poll", jobs::github_issue_poll),
        ("log_sweep", jobs::log_sweep),
        ("unblock_sweep", jobs::unblock_sweep),
        ("action_dispatcher", jobs::action_dispatcher),
    ]
}

/// Run every due job for this tick.
///
/// Returns the number of jobs run. The ledger is mutated in place; the
/// caller saves it.
pub fn run_due_jobs<C: Clock, S: ServerClient, T: WorkTools>(
    s: &Scheduler<C, S, T>,
    ledger: &mut SchedulerLedger,
    poll: Option<&PollData>,
) -> usize {
    let mut due_local = Vec::new();
    let mut due_remote = Vec::new();
    let mut skipped = 0usize;
    for job in &s.jobs {
        if !ledger.is_due(&job.name, job.interval, &s.clock) {
            skipped += 1;
            continue;
        }
        match job.group {
            JobGroup::Local => due_local.push(job),
            JobGroup::Remote => due_remote.push(job),
        }
    }
    tracing::debug!(
        local = due_local.len(),
        remote = due_remote.len(),
        skipped,
        "housekeeping dispatch"
    );

    let mut run = 0;
    for job in due_local {
        run_job(s, job, None);
        ledger.record_run(&job.name, &s.clock);
        run += 1;
    }
    for job in due_remote {
        run_job(s, job, poll);
        ledger.record_run(&job.name, &s.clock);
        run += 1;
    }
    run
}

/// Dispatch a single job with error isolation.
fn run_job<C: Clock, S: ServerClient, T: WorkTools>(
    s: &Scheduler<C, S, T>,
    job: &JobDef,
    poll: Option<&PollData>,
) {
    let ctx = JobCtx { poll, config: &job.config };
    let result = match job.job_type {
        JobType::Script => match script_jobs::<C, S, T>()
            .iter()
            .find(|(name, _)| *name == job.name)
            .map(|(_, f)| *f)
        {
            Some(f) => f(s, &ctx),
            None => {
                tracing::warn!(job = %job.name, "no job function registered");
                Ok(())
            }
        },
        JobType::Agent => run_agent_job(s, job, &ctx),
    };
    match result {
        Ok(()) => tracing::debug!(job = %job.name, "job completed"),
        Err(e) => tracing::warn!(job = %job.name, error = %e, "job failed"),
    }
}

/// Spawn a one-shot agent for a job with `type: agent`.
///
/// Counts against pool capacity for the declared blueprint and uses the
/// lightweight strategy. A spawn failure propagates to the dispatcher
/// so the log reflects "failed" rather than "completed".
fn run_agent_job<C: Clock, S: ServerClient, T: WorkTools>(
    s: &Scheduler<C, S, T>,
    job: &JobDef,
    ctx: &JobCtx<'_>,
) -> Result<(), EngineError> {
    let blueprint = AgentBlueprint {
        name: job.blueprint_name().to_string(),
        role: job
            .config
            .get("role")
            .and_then(|v| v.as_str())
            .unwrap_or("housekeeping")
            .to_string(),
        blueprint_name: None,
        interval_seconds: job.interval,
        max_instances: job.max_instances,
        paused: false,
        spawn_mode: SpawnMode::Lightweight,
        base_branch: None,
    };

    let running = s.pool.count_alive(&blueprint.pool_name());
    if running >= job.max_instances {
        tracing::debug!(job = %job.name, running, max = job.max_instances, "agent job at capacity");
        return Ok(());
    }

    let (instance, inst_state) = spawn::pick_instance(s, &blueprint);
    let state = crate::guards::EvalState {
        blueprint: &blueprint,
        ordinal: 0,
        poll: ctx.poll,
        instance,
        inst_state,
        task: None,
    };
    spawn::spawn_for(s, &state)?;
    Ok(())
}

#[cfg(test)]
#[path = "housekeeping_tests.rs"]
mod tests;
