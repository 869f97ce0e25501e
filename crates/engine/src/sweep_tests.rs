// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::Harness;
use fm_core::{InstanceName, Queue, Task, TaskId};

const DEAD_PID: i32 = 999_999_999;

fn claimed(h: &Harness, id: &str) {
    let task: Task = serde_json::from_value(serde_json::json!({
        "id": id,
        "title": "work",
        "description": "do the thing",
        "role": "implement",
        "queue": "claimed",
        "branch": "main",
        "claimed_by": "implementer-1",
        "lease_expires_at": "2026-01-01T01:00:00Z",
    }))
    .unwrap();
    h.server().insert(task);
}

fn register(h: &Harness, blueprint: &str, pid: i32, task_id: Option<&str>) {
    h.scheduler
        .pool
        .register(
            &BlueprintName::new(blueprint),
            pid,
            task_id.map(TaskId::new),
            InstanceName::new(format!("{blueprint}-1")),
            &h.clock,
        )
        .unwrap();
}

#[test]
fn dead_worker_without_result_fails_task_and_frees_slot() {
    let h = Harness::new();
    claimed(&h, "T-1");
    register(&h, "implementer", DEAD_PID, Some("T-1"));

    let released = finish_sweep(&h.scheduler);

    assert_eq!(released, 1);
    assert_eq!(h.server().task(&TaskId::new("T-1")).unwrap().queue, Queue::Failed);
    assert!(h.scheduler.pool.load(&BlueprintName::new("implementer")).is_empty());
}

#[test]
fn dead_worker_with_done_result_advances_task() {
    let h = Harness::new();
    claimed(&h, "T-1");
    register(&h, "implementer", DEAD_PID, Some("T-1"));
    h.write_result(&TaskId::new("T-1"), r#"{"outcome": "done"}"#);

    finish_sweep(&h.scheduler);

    assert_eq!(h.server().task(&TaskId::new("T-1")).unwrap().queue, Queue::Provisional);
    assert!(h.scheduler.pool.load(&BlueprintName::new("implementer")).is_empty());
}

#[test]
fn live_workers_are_left_alone() {
    let h = Harness::new();
    claimed(&h, "T-1");
    register(&h, "implementer", std::process::id() as i32, Some("T-1"));

    let released = finish_sweep(&h.scheduler);

    assert_eq!(released, 0);
    assert_eq!(h.scheduler.pool.load(&BlueprintName::new("implementer")).len(), 1);
    assert_eq!(h.server().task(&TaskId::new("T-1")).unwrap().queue, Queue::Claimed);
}

#[test]
fn step_failure_keeps_the_pid_for_retry() {
    let h = Harness::new();
    claimed(&h, "T-1");
    register(&h, "implementer", DEAD_PID, Some("T-1"));
    h.write_result(&TaskId::new("T-1"), r#"{"outcome": "done"}"#);
    h.tools().fail_on("push_branch");

    let released = finish_sweep(&h.scheduler);

    assert_eq!(released, 0);
    assert_eq!(h.scheduler.pool.load(&BlueprintName::new("implementer")).len(), 1);

    // Once the failure clears, the next sweep finishes the job.
    h.tools().clear_failure("push_branch");
    let released = finish_sweep(&h.scheduler);
    assert_eq!(released, 1);
    assert_eq!(h.server().task(&TaskId::new("T-1")).unwrap().queue, Queue::Provisional);
}

#[test]
fn taskless_entries_are_released_directly() {
    let h = Harness::new();
    register(&h, "heartbeat-agent", DEAD_PID, None);

    let released = finish_sweep(&h.scheduler);

    assert_eq!(released, 1);
    assert!(h.scheduler.pool.load(&BlueprintName::new("heartbeat-agent")).is_empty());
}

#[test]
fn instance_state_is_marked_finished() {
    let h = Harness::new();
    claimed(&h, "T-1");
    let blueprint = BlueprintName::new("implementer");
    let instance = InstanceName::new("implementer-1");

    // A started instance record pointing at the dead pid.
    let started = fm_core::InstanceState::default().mark_started(
        DEAD_PID,
        Some(TaskId::new("T-1")),
        &h.clock,
    );
    fm_storage::snapshot::write_json_atomic(
        &h.scheduler.runtime.instance_state(&blueprint, &instance),
        &started,
    )
    .unwrap();
    register(&h, "implementer", DEAD_PID, Some("T-1"));

    finish_sweep(&h.scheduler);

    let state: fm_core::InstanceState = fm_storage::snapshot::read_json_or_default(
        &h.scheduler.runtime.instance_state(&blueprint, &instance),
    );
    assert!(!state.running);
    assert_eq!(state.pid, None);
    assert!(state.last_finished.is_some());
}

#[test]
fn sweeps_blueprints_missing_from_config() {
    // A blueprint deleted from agents.yaml still gets its workers swept.
    let h = Harness::new();
    claimed(&h, "T-1");
    register(&h, "retired-blueprint", DEAD_PID, Some("T-1"));

    assert_eq!(finish_sweep(&h.scheduler), 1);
}
