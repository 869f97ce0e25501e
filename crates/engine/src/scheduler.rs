// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Scheduler` record: injected collaborators plus loaded config.
//!
//! Created once at startup and passed by reference into every component;
//! there is no process-wide mutable state anywhere in the engine.

use crate::{steps, EngineError};
use fm_client::ServerClient;
use fm_core::{AgentBlueprint, Clock, OrchestratorId};
use fm_playbook::{load_agents, load_flow, load_jobs, FlowDef, JobDef};
use fm_storage::{PoolRegistry, RuntimeDir};
use crate::tools::WorkTools;
use std::path::{Path, PathBuf};

/// Injected collaborators.
pub struct SchedulerDeps<C: Clock, S: ServerClient, T: WorkTools> {
    pub clock: C,
    pub client: S,
    pub tools: T,
}

/// Deployment configuration that does not live in the YAML files.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Root of the project the agents work on.
    pub project_root: PathBuf,
    /// Shell command line used to launch a worker.
    pub worker_command: String,
    /// Lease passed to `tasks.claim`.
    pub lease_duration_seconds: u64,
    /// Backpressure threshold: skip spawning implementers when this many
    /// tasks sit in `provisional`.
    pub max_provisional: u64,
    /// Command the `run_tests` step executes in the task worktree.
    pub test_command: Option<String>,
}

impl SchedulerConfig {
    pub fn new(project_root: impl Into<PathBuf>) -> SchedulerConfig {
        SchedulerConfig {
            project_root: project_root.into(),
            worker_command: "foreman-worker".to_string(),
            lease_duration_seconds: 900,
            max_provisional: 10,
            test_command: None,
        }
    }
}

/// Locations of the three YAML configuration files.
#[derive(Debug, Clone)]
pub struct ConfigDir {
    root: PathBuf,
}

impl ConfigDir {
    pub fn new(root: impl Into<PathBuf>) -> ConfigDir {
        ConfigDir { root: root.into() }
    }

    pub fn flow_path(&self) -> PathBuf {
        self.root.join("flow.yaml")
    }

    pub fn agents_path(&self) -> PathBuf {
        self.root.join("agents.yaml")
    }

    pub fn jobs_path(&self) -> PathBuf {
        self.root.join("jobs.yaml")
    }
}

/// One scheduler instance.
///
/// The flow definition is loaded (and validated) once at startup; the
/// agents and jobs files are re-read each tick so configuration edits
/// take effect without a restart.
pub struct Scheduler<C: Clock, S: ServerClient, T: WorkTools> {
    pub clock: C,
    pub client: S,
    pub tools: T,
    pub runtime: RuntimeDir,
    pub pool: PoolRegistry,
    pub flow: FlowDef,
    pub config: SchedulerConfig,
    pub orchestrator_id: OrchestratorId,
    config_dir: ConfigDir,
    /// Refreshed by the tick; empty until the first reload.
    pub agents: Vec<AgentBlueprint>,
    pub jobs: Vec<JobDef>,
}

impl<C: Clock, S: ServerClient, T: WorkTools> Scheduler<C, S, T> {
    /// Build a scheduler. Fatal on malformed flow or an unknown step
    /// name; the tick must refuse to run rather than guess.
    pub fn new(
        deps: SchedulerDeps<C, S, T>,
        config_dir: ConfigDir,
        runtime: RuntimeDir,
        config: SchedulerConfig,
    ) -> Result<Self, EngineError> {
        runtime.ensure()?;
        let flow = load_flow(&config_dir.flow_path())?;
        steps::validate_flow(&flow)?;
        let orchestrator_id = load_or_create_orchestrator_id(&runtime)?;
        let pool = PoolRegistry::new(runtime.clone());
        Ok(Scheduler {
            clock: deps.clock,
            client: deps.client,
            tools: deps.tools,
            runtime,
            pool,
            flow,
            config,
            orchestrator_id,
            config_dir,
            agents: Vec::new(),
            jobs: Vec::new(),
        })
    }

    /// Re-read agents.yaml and jobs.yaml. Malformed files abort the tick.
    pub fn reload_config(&mut self) -> Result<(), EngineError> {
        self.agents = load_agents(&self.config_dir.agents_path())?;
        self.jobs = load_jobs(&self.config_dir.jobs_path())?;
        Ok(())
    }

    /// The scheduler is globally paused while this marker file exists.
    pub fn globally_paused(&self) -> bool {
        self.runtime.root().join("paused").exists()
    }

    /// Blueprints whose role marks them as review/gatekeeper strategies.
    pub fn is_reviewer(blueprint: &AgentBlueprint) -> bool {
        matches!(blueprint.role.as_str(), "review" | "gatekeeper")
    }
}

fn load_or_create_orchestrator_id(runtime: &RuntimeDir) -> Result<OrchestratorId, EngineError> {
    let path = runtime.orchestrator_id_file();
    match std::fs::read_to_string(&path) {
        Ok(raw) => Ok(OrchestratorId::new(raw.trim())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let id = OrchestratorId::generate();
            std::fs::write(&path, id.as_str())?;
            Ok(id)
        }
        Err(e) => Err(e.into()),
    }
}

/// Startup integrity check: refuse to run when the scheduler binary
/// lives inside an agent worktree (a miswired install would let a worker
/// update the scheduler underneath itself).
pub fn verify_install_path(runtime: &RuntimeDir) -> Result<(), EngineError> {
    let exe = std::env::current_exe()?;
    for dir in [runtime.agents_dir(), runtime.tasks_dir()] {
        if path_is_under(&exe, &dir) {
            return Err(EngineError::InstallPath(exe.display().to_string()));
        }
    }
    Ok(())
}

fn path_is_under(path: &Path, dir: &Path) -> bool {
    path.ancestors().any(|p| p == dir)
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
