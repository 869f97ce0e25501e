// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Housekeeping job file (`jobs.yaml`).

use crate::PlaybookError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// How a job executes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    /// Calls a registered function in the dispatcher.
    #[default]
    Script,
    /// Spawns a one-shot agent through the lightweight strategy.
    Agent,
}

/// Whether a job needs server data.
///
/// Local jobs run first without any server call; remote jobs share one
/// batched poll fetched once per tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobGroup {
    Local,
    #[default]
    Remote,
}

/// One declared housekeeping job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDef {
    pub name: String,
    #[serde(rename = "type", default)]
    pub job_type: JobType,
    #[serde(default)]
    pub group: JobGroup,
    /// Seconds between runs.
    #[serde(default = "default_interval")]
    pub interval: u64,
    /// Blueprint for agent-typed jobs; defaults to the job name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blueprint: Option<String>,
    #[serde(default = "default_max_instances")]
    pub max_instances: usize,
    /// Extra per-job configuration, interpreted by the job itself.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config: BTreeMap<String, serde_yaml::Value>,
}

fn default_interval() -> u64 {
    60
}

fn default_max_instances() -> usize {
    1
}

impl JobDef {
    /// Pool-capacity key for agent-typed jobs.
    pub fn blueprint_name(&self) -> &str {
        self.blueprint.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Deserialize)]
struct JobsFile {
    #[serde(default)]
    jobs: Vec<JobDef>,
}

/// Load the housekeeping job list. A missing file means no declared
/// jobs, which is a valid (if unusual) deployment.
pub fn load_jobs(path: &Path) -> Result<Vec<JobDef>, PlaybookError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => return Err(PlaybookError::Read { path: path.to_path_buf(), source }),
    };
    let file: JobsFile = serde_yaml::from_str(&raw)
        .map_err(|source| PlaybookError::Yaml { path: path.to_path_buf(), source })?;
    Ok(file.jobs)
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;
