// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lease expiry and re-claim.

use crate::prelude::*;
use fm_client::{ClaimParams, ServerClient};
use fm_core::OrchestratorId;
use std::time::Duration;

fn claim_with_lease(h: &Harness, lease_seconds: u64) -> Task {
    let orchestrator_id = OrchestratorId::new("orc-spec");
    let agent = InstanceName::new("implementer-1");
    h.server()
        .claim_task(&ClaimParams {
            orchestrator_id: &orchestrator_id,
            agent_name: &agent,
            role_filter: "implement",
            lease_duration_seconds: Some(lease_seconds),
        })
        .unwrap()
        .unwrap()
}

#[test]
fn expired_lease_returns_the_task_for_a_fresh_claim() {
    let mut h = Harness::new();
    h.set_agents(STANDARD_AGENTS);
    h.set_jobs("jobs:\n  - name: lease_monitor\n    interval: 1\n");
    h.server().seed_incoming("T-1", "implement");

    let claimed = claim_with_lease(&h, 1);
    assert_eq!(claimed.queue, Queue::Claimed);

    // Advance past the lease; the next tick's lease monitor requeues.
    h.clock.advance(Duration::from_secs(2));
    tick(&mut h);

    let task = h.server().task(&TaskId::new("T-1")).unwrap();
    // The tick may have immediately re-claimed the recovered task for
    // the implementer blueprint; either way the stale claim is gone.
    assert_ne!(task.claimed_by, Some(InstanceName::new("implementer-1")));
    assert!(task.queue == Queue::Incoming || task.queue == Queue::Claimed);
}

#[test]
fn unexpired_lease_is_left_alone() {
    let h = Harness::new();
    h.server().seed_incoming("T-1", "implement");
    claim_with_lease(&h, 900);

    h.clock.advance(Duration::from_secs(10));
    fm_engine::lease::run_lease_monitor(&h.scheduler);

    let task = h.server().task(&TaskId::new("T-1")).unwrap();
    assert_eq!(task.queue, Queue::Claimed);
    assert!(task.claimed_by.is_some());
}

#[test]
fn monitor_then_claim_hands_the_task_to_the_next_agent() {
    let h = Harness::new();
    h.server().seed_incoming("T-1", "implement");
    claim_with_lease(&h, 1);

    h.clock.advance(Duration::from_secs(2));
    fm_engine::lease::run_lease_monitor(&h.scheduler);
    assert_eq!(queue_of(&h, "T-1"), Queue::Incoming);

    let reclaimed = claim_with_lease(&h, 900);
    assert_eq!(reclaimed.id, "T-1");
    assert_eq!(reclaimed.queue, Queue::Claimed);
}
