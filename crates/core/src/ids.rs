// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed identifiers.
//!
//! Task and blueprint identifiers are opaque strings minted by the server
//! or the configuration files; only the orchestrator id is generated here.

crate::string_id! {
    /// Unique identifier for a task, as issued by the task server.
    pub struct TaskId;
}

crate::string_id! {
    /// Name of an agent blueprint (the pool-capacity unit).
    pub struct BlueprintName;
}

crate::string_id! {
    /// Name of a single worker instance of a blueprint.
    pub struct InstanceName;
}

crate::string_id! {
    /// Identifier this orchestrator registers with the server.
    pub struct OrchestratorId;
}

impl OrchestratorId {
    pub const PREFIX: &'static str = "orc-";

    /// Generate a new random orchestrator id.
    pub fn generate() -> Self {
        Self(format!("{}{}", Self::PREFIX, nanoid::nanoid!(19)))
    }
}

impl InstanceName {
    /// Conventional instance name for the nth slot of a blueprint,
    /// e.g. `implementer-1`.
    pub fn for_slot(blueprint: &BlueprintName, slot: usize) -> Self {
        Self(format!("{}-{}", blueprint, slot))
    }
}
