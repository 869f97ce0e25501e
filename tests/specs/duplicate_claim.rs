// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Duplicate-claim prevention.
//!
//! After a lease expiry the server can hand a task out again while the
//! original worker is still alive; the claim guard must refuse to spawn
//! a second worker for it.

use crate::prelude::*;

#[test]
fn a_task_held_by_a_live_worker_is_not_claimed_twice() {
    let mut h = Harness::new();
    h.set_agents(STANDARD_AGENTS);

    // W1 is alive (this test process) and holds T-1 in the pool.
    h.scheduler
        .pool
        .register(
            &fm_core::BlueprintName::new("implementer"),
            std::process::id() as i32,
            Some(TaskId::new("T-1")),
            InstanceName::new("implementer-1"),
            &h.clock,
        )
        .unwrap();

    // The server re-surfaces T-1 in incoming (lease expired earlier).
    h.server().seed_incoming("T-1", "implement");

    let stats = tick(&mut h);

    // The claim happened server-side, but no second worker was spawned.
    assert_eq!(stats.spawned, 0);
    assert!(h.tools().spawned().is_empty());
    // The pool still has exactly the original worker for T-1.
    let pool = h.scheduler.pool.load(&fm_core::BlueprintName::new("implementer"));
    assert_eq!(pool.len(), 1);
}

#[test]
fn a_different_task_is_still_claimable() {
    let mut h = Harness::new();
    h.set_agents(STANDARD_AGENTS);
    h.scheduler
        .pool
        .register(
            &fm_core::BlueprintName::new("implementer"),
            std::process::id() as i32,
            Some(TaskId::new("T-1")),
            InstanceName::new("implementer-1"),
            &h.clock,
        )
        .unwrap();
    h.server().seed_incoming("T-2", "implement");

    let stats = tick(&mut h);

    assert_eq!(stats.spawned, 1);
    assert_eq!(queue_of(&h, "T-2"), Queue::Claimed);
}
