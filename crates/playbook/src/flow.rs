// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Flow definitions: the task-lifecycle state machine.
//!
//! A flow maps each queue to an ordered list of transitions. A transition
//! carries an optional condition key (matched against what the result
//! handler derives from the worker's artifact), an ordered list of named
//! steps, and a target queue. A flow may embed a child flow applied to
//! child-of-project tasks.

use crate::PlaybookError;
use fm_core::{Queue, Task};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One transition out of a queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionDef {
    /// Condition key; `None` matches unconditionally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
    /// Ordered step names, executed before the queue move.
    #[serde(default)]
    pub steps: Vec<String>,
    /// Target queue.
    pub to: String,
}

impl TransitionDef {
    pub fn target(&self) -> Option<Queue> {
        Queue::parse(&self.to)
    }
}

/// A parsed flow definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowDef {
    #[serde(default = "default_flow_name")]
    pub name: String,
    /// Queue name → ordered transitions, in declaration order.
    pub states: IndexMap<String, Vec<TransitionDef>>,
    /// Flow applied to child-of-project tasks (see [`FlowDef::flow_for`]).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_flow: Option<Box<FlowDef>>,
}

fn default_flow_name() -> String {
    "default".to_string()
}

impl FlowDef {
    /// Transitions declared from the given queue.
    pub fn transitions_from(&self, queue: Queue) -> &[TransitionDef] {
        self.states.get(queue.to_string().as_str()).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First transition out of `queue` whose condition matches.
    ///
    /// A transition without a `when` key matches any condition.
    pub fn select(&self, queue: Queue, condition: &str) -> Option<&TransitionDef> {
        self.transitions_from(queue)
            .iter()
            .find(|t| t.when.as_deref().map(|w| w == condition).unwrap_or(true))
    }

    /// Resolve which flow governs a task.
    ///
    /// The child flow is consulted only when the task belongs to a
    /// project AND this flow declares a child flow AND this flow has no
    /// transition from the task's current queue. A parent-level
    /// transition always wins.
    pub fn flow_for(&self, task: &Task) -> &FlowDef {
        if task.project_id.is_some() && !self.transitions_from(task.queue).is_empty() {
            return self;
        }
        match (&task.project_id, &self.child_flow) {
            (Some(_), Some(child)) => child,
            _ => self,
        }
    }

    /// Validate every state key and transition target against the known
    /// queue set.
    pub fn validate(&self) -> Result<(), PlaybookError> {
        if self.states.is_empty() {
            return Err(PlaybookError::EmptyFlow { flow: self.name.clone() });
        }
        for (state, transitions) in &self.states {
            if Queue::parse(state).is_none() {
                return Err(PlaybookError::UnknownQueue {
                    flow: self.name.clone(),
                    queue: state.clone(),
                });
            }
            for transition in transitions {
                if transition.target().is_none() {
                    return Err(PlaybookError::UnknownQueue {
                        flow: self.name.clone(),
                        queue: transition.to.clone(),
                    });
                }
            }
        }
        if let Some(child) = &self.child_flow {
            child.validate()?;
        }
        Ok(())
    }

    /// All step names referenced anywhere in this flow (including the
    /// child flow), for startup validation against the step registry.
    pub fn referenced_steps(&self) -> Vec<&str> {
        let mut steps: Vec<&str> = self
            .states
            .values()
            .flatten()
            .flat_map(|t| t.steps.iter().map(String::as_str))
            .collect();
        if let Some(child) = &self.child_flow {
            steps.extend(child.referenced_steps());
        }
        steps.sort_unstable();
        steps.dedup();
        steps
    }
}

/// Load and validate a flow definition file.
pub fn load_flow(path: &Path) -> Result<FlowDef, PlaybookError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|source| PlaybookError::Read { path: path.to_path_buf(), source })?;
    let flow: FlowDef = serde_yaml::from_str(&raw)
        .map_err(|source| PlaybookError::Yaml { path: path.to_path_buf(), source })?;
    flow.validate()?;
    Ok(flow)
}

#[cfg(test)]
#[path = "flow_tests.rs"]
mod tests;
