// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crash recovery: a worker died without leaving a result.

use crate::prelude::*;

#[test]
fn dead_worker_without_result_fails_the_task_and_frees_the_pid() {
    let mut h = Harness::new();
    h.set_agents(STANDARD_AGENTS);
    h.server().seed_incoming("T-1", "implement");

    // Tick 1: claim and spawn. The scripted spawn hands back a PID that
    // was never alive, which is indistinguishable from a crash.
    tick(&mut h);
    assert_eq!(queue_of(&h, "T-1"), Queue::Claimed);
    let pool = h.scheduler.pool.load(&fm_core::BlueprintName::new("implementer"));
    assert_eq!(pool.len(), 1);

    // Tick 2: the sweep finds the dead PID and no result.json.
    next_interval(&h);
    let stats = tick(&mut h);

    assert_eq!(stats.swept, 1);
    assert_eq!(queue_of(&h, "T-1"), Queue::Failed);
    assert!(h.scheduler.pool.load(&fm_core::BlueprintName::new("implementer")).is_empty());
}

#[test]
fn dead_worker_with_notes_parks_for_continuation() {
    let mut h = Harness::new();
    h.set_agents(STANDARD_AGENTS);
    h.server().seed_incoming("T-1", "implement");

    tick(&mut h);
    h.write_notes(&TaskId::new("T-1"), "halfway through the refactor");
    next_interval(&h);
    tick(&mut h);

    assert_eq!(queue_of(&h, "T-1"), Queue::NeedsContinuation);
}
