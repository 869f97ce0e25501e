// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Zero-commit resubmission is auto-rejected at the client layer.

use crate::prelude::*;
use fm_client::{ServerClient, SubmitOutcome};
use fm_engine::results::handle_agent_result;

#[test]
fn zero_commit_resubmission_short_circuits_to_incoming() {
    let mut h = Harness::new();
    h.set_agents(STANDARD_AGENTS);
    h.server().seed_incoming("T-1", "implement");
    h.tools().set_commits_ahead(0);

    // First round: claim, produce nothing. A fresh task still parks in
    // provisional; a reviewer then rejects it for having no commits.
    tick(&mut h);
    h.write_result(&TaskId::new("T-1"), r#"{"outcome": "done"}"#);
    next_interval(&h);
    tick(&mut h);
    assert_eq!(queue_of(&h, "T-1"), Queue::Provisional);
    h.server().reject_task(&TaskId::new("T-1"), "no_commits", None).unwrap();
    assert_eq!(h.server().task(&TaskId::new("T-1")).unwrap().attempt_count, 1);

    // Second round: claimed again, zero commits again.
    next_interval(&h);
    tick(&mut h);
    assert_eq!(queue_of(&h, "T-1"), Queue::Claimed);
    h.write_result(&TaskId::new("T-1"), r#"{"outcome": "done"}"#);

    handle_agent_result(&h.scheduler, &TaskId::new("T-1")).unwrap();

    // The submit short-circuited: straight back to incoming, never
    // through provisional, attempt counted exactly once.
    let task = h.server().task(&TaskId::new("T-1")).unwrap();
    assert_eq!(task.queue, Queue::Incoming);
    assert_eq!(task.attempt_count, 2);
}

#[test]
fn direct_submit_call_applies_the_same_rule() {
    let h = Harness::new();
    h.server().seed_incoming("T-1", "implement");

    // Simulate prior rejection history.
    let mut task = h.server().task(&TaskId::new("T-1")).unwrap();
    task.attempt_count = 1;
    task.queue = Queue::Claimed;
    task.claimed_by = Some(InstanceName::new("implementer-1"));
    task.lease_expires_at = Some("2026-01-01T00:10:00Z".to_string());
    h.server().insert(task);

    let outcome = h.server().submit_task(&TaskId::new("T-1"), 0, 9).unwrap();
    assert_eq!(outcome, SubmitOutcome::AutoRejected);
    assert_eq!(queue_of(&h, "T-1"), Queue::Incoming);
}
