// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent blueprint file (`agents.yaml`).
//!
//! Re-read each tick, so pausing a blueprint or changing its interval
//! takes effect without a restart.

use crate::PlaybookError;
use fm_core::AgentBlueprint;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct AgentsFile {
    #[serde(default)]
    agents: Vec<AgentBlueprint>,
}

/// Load the blueprint list. A missing file is fatal: a scheduler with
/// no agents file is miswired, not idle.
pub fn load_agents(path: &Path) -> Result<Vec<AgentBlueprint>, PlaybookError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|source| PlaybookError::Read { path: path.to_path_buf(), source })?;
    let file: AgentsFile = serde_yaml::from_str(&raw)
        .map_err(|source| PlaybookError::Yaml { path: path.to_path_buf(), source })?;

    for blueprint in &file.agents {
        if blueprint.name.is_empty() || blueprint.role.is_empty() {
            tracing::warn!(name = %blueprint.name, "blueprint with empty name or role");
        }
    }
    Ok(file.agents)
}

#[cfg(test)]
#[path = "agents_tests.rs"]
mod tests;
