// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent blueprint configuration.

use crate::ids::BlueprintName;
use serde::{Deserialize, Serialize};

/// How a worker's task directory is prepared before launch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpawnMode {
    /// Long-lived git worktree, one per blueprint instance.
    Worktree,
    /// Per-task checkout on branch `agent/<task_id>`, one-shot workers.
    #[default]
    Task,
    /// Minimal directory, no checkout; housekeeping agents that only
    /// talk to the server.
    Lightweight,
}

crate::simple_display! {
    SpawnMode {
        Worktree => "worktree",
        Task => "task",
        Lightweight => "lightweight",
    }
}

/// A configuration entry describing a class of worker.
///
/// Blueprints are declared in `agents.yaml` and re-read each tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentBlueprint {
    pub name: String,
    /// Role filter used when claiming tasks.
    pub role: String,
    /// Pool-capacity key; defaults to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blueprint_name: Option<String>,
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,
    #[serde(default = "default_max_instances")]
    pub max_instances: usize,
    #[serde(default)]
    pub paused: bool,
    #[serde(default)]
    pub spawn_mode: SpawnMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_branch: Option<String>,
}

fn default_interval() -> u64 {
    300
}

fn default_max_instances() -> usize {
    1
}

impl AgentBlueprint {
    /// The pool-capacity key for this blueprint.
    pub fn pool_name(&self) -> BlueprintName {
        BlueprintName::new(self.blueprint_name.as_deref().unwrap_or(&self.name))
    }

    /// Whether this blueprint claims one task per worker.
    pub fn claims_tasks(&self) -> bool {
        matches!(self.spawn_mode, SpawnMode::Task)
    }
}
