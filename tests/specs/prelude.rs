// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for the scenario specs.

pub use fm_core::{InstanceName, Queue, Task, TaskId};
pub use fm_engine::test_support::Harness;
pub use fm_engine::{run_tick, TickOutcome};

/// One implementer and one gatekeeper, both on short intervals.
pub const STANDARD_AGENTS: &str = r#"
agents:
  - name: implementer
    role: implement
    interval_seconds: 60
    max_instances: 2
    spawn_mode: task
  - name: gatekeeper
    role: gatekeeper
    interval_seconds: 60
    max_instances: 1
    spawn_mode: task
"#;

/// Run a tick and panic on anything but completion.
pub fn tick(h: &mut Harness) -> fm_engine::tick::TickStats {
    match run_tick(&mut h.scheduler).expect("tick must not error") {
        TickOutcome::Completed(stats) => stats,
        TickOutcome::LockHeld => panic!("scheduler lock unexpectedly held"),
    }
}

/// Advance the fake clock so every blueprint is due again.
pub fn next_interval(h: &Harness) {
    h.clock.advance(std::time::Duration::from_secs(120));
}

pub fn queue_of(h: &Harness, id: &str) -> Queue {
    h.server().task(&TaskId::new(id)).expect("task must exist").queue
}
