// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Idempotence and boundary laws.

use crate::prelude::*;
use fm_client::{ClaimParams, OrchestratorInfo, ServerClient};
use fm_core::OrchestratorId;
use fm_engine::results::handle_agent_result;
use std::time::Duration;

#[test]
fn handling_the_same_done_artifact_twice_is_idempotent() {
    let mut h = Harness::new();
    h.set_agents(STANDARD_AGENTS);
    h.server().seed_incoming("T-1", "implement");
    h.tools().set_commits_ahead(1);

    tick(&mut h);
    h.write_result(&TaskId::new("T-1"), r#"{"outcome": "done"}"#);

    handle_agent_result(&h.scheduler, &TaskId::new("T-1")).unwrap();
    let first = h.server().task(&TaskId::new("T-1")).unwrap();
    handle_agent_result(&h.scheduler, &TaskId::new("T-1")).unwrap();
    let second = h.server().task(&TaskId::new("T-1")).unwrap();

    assert_eq!(first.queue, Queue::Provisional);
    assert_eq!(first.queue, second.queue);
    assert_eq!(first.attempt_count, second.attempt_count);
    assert_eq!(first.pr_number, second.pr_number);
}

#[test]
fn lease_monitor_before_expiry_changes_nothing() {
    let h = Harness::new();
    h.server().seed_incoming("T-1", "implement");
    let orchestrator_id = OrchestratorId::new("orc-spec");
    let agent = InstanceName::new("implementer-1");
    h.server()
        .claim_task(&ClaimParams {
            orchestrator_id: &orchestrator_id,
            agent_name: &agent,
            role_filter: "implement",
            lease_duration_seconds: Some(600),
        })
        .unwrap()
        .unwrap();
    let before = h.server().task(&TaskId::new("T-1")).unwrap();

    h.clock.advance(Duration::from_secs(300));
    fm_engine::lease::run_lease_monitor(&h.scheduler);

    let after = h.server().task(&TaskId::new("T-1")).unwrap();
    assert_eq!(before.queue, after.queue);
    assert_eq!(before.claimed_by, after.claimed_by);
    assert_eq!(before.lease_expires_at, after.lease_expires_at);
}

#[test]
fn registering_the_orchestrator_twice_equals_once() {
    let h = Harness::new();
    let info = OrchestratorInfo {
        id: OrchestratorId::new("orc-spec"),
        hostname: "spec-host".to_string(),
        project_root: "/tmp/project".to_string(),
        version: "0.1.0".to_string(),
    };

    h.server().register_orchestrator(&info).unwrap();
    h.server().register_orchestrator(&info).unwrap();

    assert!(h.server().poll().unwrap().orchestrator_registered);
}

#[test]
fn claim_against_empty_incoming_returns_null_without_error() {
    let h = Harness::new();
    let orchestrator_id = OrchestratorId::new("orc-spec");
    let agent = InstanceName::new("implementer-1");
    let claimed = h
        .server()
        .claim_task(&ClaimParams {
            orchestrator_id: &orchestrator_id,
            agent_name: &agent,
            role_filter: "implement",
            lease_duration_seconds: None,
        })
        .unwrap();
    assert!(claimed.is_none());
}

#[test]
fn attempt_and_rejection_counters_never_decrease() {
    let h = Harness::new();
    h.server().seed_incoming("T-1", "implement");
    let mut last_attempt = 0;
    let mut last_rejection = 0;

    for round in 0..3 {
        let orchestrator_id = OrchestratorId::new("orc-spec");
        let agent = InstanceName::new("implementer-1");
        h.server()
            .claim_task(&ClaimParams {
                orchestrator_id: &orchestrator_id,
                agent_name: &agent,
                role_filter: "implement",
                lease_duration_seconds: Some(60),
            })
            .unwrap()
            .unwrap();
        let feedback = if round % 2 == 0 { Some("fix it") } else { None };
        h.server().reject_task(&TaskId::new("T-1"), "rejected", feedback).unwrap();

        let task = h.server().task(&TaskId::new("T-1")).unwrap();
        assert!(task.attempt_count > last_attempt);
        assert!(task.rejection_count >= last_rejection);
        last_attempt = task.attempt_count;
        last_rejection = task.rejection_count;
    }
}
