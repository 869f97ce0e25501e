// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Happy path: implement → review → done.

use crate::prelude::*;

#[test]
fn task_flows_from_incoming_to_done() {
    let mut h = Harness::new();
    h.set_agents(STANDARD_AGENTS);
    h.server().seed_incoming("T-1", "implement");
    h.tools().set_commits_ahead(1);

    // Tick 1: the implementer claims T-1 and a worker is launched.
    let stats = tick(&mut h);
    assert_eq!(stats.spawned, 1);
    assert_eq!(queue_of(&h, "T-1"), Queue::Claimed);
    let task = h.server().task(&TaskId::new("T-1")).unwrap();
    assert!(task.claimed_by.is_some());
    assert!(task.lease_expires_at.is_some());

    // The worker makes one commit and reports done before exiting.
    h.write_result(&TaskId::new("T-1"), r#"{"outcome": "done"}"#);
    next_interval(&h);

    // Tick 2: the sweep advances T-1 to provisional with a PR, and the
    // gatekeeper picks it up for review.
    let stats = tick(&mut h);
    assert_eq!(stats.swept, 1);
    let task = h.server().task(&TaskId::new("T-1")).unwrap();
    assert_eq!(task.queue, Queue::Provisional);
    assert!(task.pr_number.is_some(), "submit flow must create the PR");
    assert_eq!(task.commits_count, 1);
    // Claim cleared outside `claimed`.
    assert!(task.claimed_by.is_none());
    assert!(task.lease_expires_at.is_none());
    assert_eq!(stats.spawned, 1, "gatekeeper dispatched against the provisional task");

    // The reviewer approves.
    h.write_result(
        &TaskId::new("T-1"),
        r#"{"status": "success", "decision": "approve", "comment": "LGTM"}"#,
    );
    next_interval(&h);

    // Tick 3: the sweep merges and accepts.
    tick(&mut h);
    assert_eq!(queue_of(&h, "T-1"), Queue::Done);
    let pr = h.server().task(&TaskId::new("T-1")).unwrap().pr_number.unwrap();
    assert_eq!(h.tools().merged_prs(), vec![pr]);

    // Every pool slot is free again.
    assert_eq!(h.scheduler.pool.count_alive(&fm_core::BlueprintName::new("implementer")), 0);
    assert_eq!(h.scheduler.pool.count_alive(&fm_core::BlueprintName::new("gatekeeper")), 0);
}

#[test]
fn worker_environment_matches_the_contract() {
    let mut h = Harness::new();
    h.set_agents(STANDARD_AGENTS);
    h.server().seed_incoming("T-1", "implement");

    tick(&mut h);

    let spawned = h.tools().spawned();
    assert_eq!(spawned.len(), 1);
    let env: std::collections::BTreeMap<_, _> = spawned[0].env.iter().cloned().collect();
    for key in [
        "AGENT_NAME",
        "AGENT_ID",
        "AGENT_ROLE",
        "PARENT_PROJECT",
        "WORKTREE",
        "SHARED_DIR",
        "ORCHESTRATOR_DIR",
        "CURRENT_TASK_ID",
        "AGENT_PORT_BASE",
    ] {
        assert!(env.contains_key(key), "missing {key}");
    }
    assert_eq!(env["CURRENT_TASK_ID"], "T-1");
}
