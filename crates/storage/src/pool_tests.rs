// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fm_core::FakeClock;

fn setup() -> (tempfile::TempDir, PoolRegistry, FakeClock) {
    let dir = tempfile::tempdir().unwrap();
    let runtime = RuntimeDir::new(dir.path());
    (dir, PoolRegistry::new(runtime), FakeClock::new())
}

fn own_pid() -> i32 {
    std::process::id() as i32
}

const DEAD_PID: i32 = 999_999_999;

#[test]
fn register_and_load_round_trip() {
    let (_dir, pool, clock) = setup();
    let bp = BlueprintName::new("implementer");

    pool.register(&bp, own_pid(), Some(TaskId::new("T-1")), InstanceName::new("implementer-1"), &clock)
        .unwrap();

    let pids = pool.load(&bp);
    assert_eq!(pids.len(), 1);
    assert_eq!(pids[&own_pid()].task_id, Some(TaskId::new("T-1")));
    assert_eq!(pids[&own_pid()].instance_name, InstanceName::new("implementer-1"));
}

#[test]
fn count_alive_ignores_dead_pids_without_removing() {
    let (_dir, pool, clock) = setup();
    let bp = BlueprintName::new("implementer");

    pool.register(&bp, own_pid(), Some(TaskId::new("T-1")), InstanceName::new("implementer-1"), &clock)
        .unwrap();
    pool.register(&bp, DEAD_PID, Some(TaskId::new("T-2")), InstanceName::new("implementer-2"), &clock)
        .unwrap();

    assert_eq!(pool.count_alive(&bp), 1);
    // Dead entry stays until the sweep removes it post-result.
    assert_eq!(pool.load(&bp).len(), 2);
}

#[test]
fn active_task_ids_only_covers_alive_pids() {
    let (_dir, pool, clock) = setup();
    let bp = BlueprintName::new("implementer");

    pool.register(&bp, own_pid(), Some(TaskId::new("T-1")), InstanceName::new("implementer-1"), &clock)
        .unwrap();
    pool.register(&bp, DEAD_PID, Some(TaskId::new("T-2")), InstanceName::new("implementer-2"), &clock)
        .unwrap();

    let active = pool.active_task_ids(&bp);
    assert!(active.contains(&TaskId::new("T-1")));
    assert!(!active.contains(&TaskId::new("T-2")));
}

#[test]
fn remove_finished_returns_entry_and_clears_it() {
    let (_dir, pool, clock) = setup();
    let bp = BlueprintName::new("reviewer");

    pool.register(&bp, DEAD_PID, Some(TaskId::new("T-3")), InstanceName::new("reviewer-1"), &clock)
        .unwrap();

    let removed = pool.remove_finished(&bp, DEAD_PID, &clock).unwrap();
    assert_eq!(removed.map(|e| e.task_id).flatten(), Some(TaskId::new("T-3")));
    assert!(pool.load(&bp).is_empty());
}

#[test]
fn remove_finished_on_untracked_pid_is_none() {
    let (_dir, pool, clock) = setup();
    let bp = BlueprintName::new("reviewer");
    assert!(pool.remove_finished(&bp, 12345, &clock).unwrap().is_none());
}

#[test]
fn blueprints_are_isolated() {
    let (_dir, pool, clock) = setup();
    pool.register(
        &BlueprintName::new("implementer"),
        own_pid(),
        Some(TaskId::new("T-1")),
        InstanceName::new("implementer-1"),
        &clock,
    )
    .unwrap();

    assert_eq!(pool.count_alive(&BlueprintName::new("reviewer")), 0);
}

#[test]
fn corrupt_snapshot_loads_empty() {
    let (dir, pool, _clock) = setup();
    let bp = BlueprintName::new("implementer");
    let path = RuntimeDir::new(dir.path()).blueprint_pids(&bp);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{broken").unwrap();

    assert!(pool.load(&bp).is_empty());
}

#[test]
fn mutations_append_audit_lines_with_caller() {
    let (dir, pool, clock) = setup();
    let bp = BlueprintName::new("implementer");

    pool.register(&bp, own_pid(), Some(TaskId::new("T-1")), InstanceName::new("implementer-1"), &clock)
        .unwrap();
    pool.remove_finished(&bp, own_pid(), &clock).unwrap();

    let audit = std::fs::read_to_string(RuntimeDir::new(dir.path()).pid_audit()).unwrap();
    let lines: Vec<serde_json::Value> =
        audit.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(lines.len(), 2);

    assert_eq!(lines[0]["action"], "register");
    assert_eq!(lines[1]["action"], "remove_finished");
    // Caller is the test, not pool.rs internals.
    assert!(lines[0]["caller"].as_str().unwrap().contains("pool_tests.rs"));
    // Before/after alive sets bracket the mutation.
    assert_eq!(lines[0]["pids_before"], serde_json::json!([]));
    assert_eq!(lines[0]["pids_after"], serde_json::json!([own_pid()]));
    assert_eq!(lines[1]["pids_after"], serde_json::json!([]));
}
