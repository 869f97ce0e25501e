// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::Harness;
use fm_client::fake::ActionState;

fn action(id: &str, action_type: &str, payload: serde_json::Value) -> ActionRecord {
    ActionRecord { id: id.to_string(), action_type: action_type.to_string(), payload }
}

#[test]
fn ping_completes_with_payload_echo() {
    let h = Harness::new();
    h.server().push_action(action("a1", "ping", serde_json::json!({"hello": "world"})));

    process_actions(&h.scheduler);

    match h.server().action_state("a1") {
        Some(ActionState::Completed(result)) => {
            assert_eq!(result["pong"]["hello"], "world");
        }
        other => panic!("expected completion, got {other:?}"),
    }
}

#[test]
fn unknown_action_type_fails_with_diagnostic() {
    let h = Harness::new();
    h.server().push_action(action("a1", "launch_rockets", serde_json::json!({})));

    process_actions(&h.scheduler);

    match h.server().action_state("a1") {
        Some(ActionState::Failed(error)) => {
            assert_eq!(error, "unknown action_type: launch_rockets");
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[test]
fn handler_error_fails_the_action() {
    let h = Harness::new();
    h.server().push_action(action("a1", "create_task", serde_json::json!({"not": "a task"})));

    process_actions(&h.scheduler);

    match h.server().action_state("a1") {
        Some(ActionState::Failed(error)) => {
            assert!(error.contains("invalid create_task payload"), "error: {error}");
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[test]
fn create_task_action_creates_an_incoming_task() {
    let h = Harness::new();
    h.server().push_action(action(
        "a1",
        "create_task",
        serde_json::json!({
            "title": "from action",
            "description": "requested externally",
            "role": "implement",
        }),
    ));

    process_actions(&h.scheduler);

    match h.server().action_state("a1") {
        Some(ActionState::Completed(result)) => {
            let id = result["task_id"].as_str().unwrap();
            let task = h.server().task(&fm_core::TaskId::new(id)).unwrap();
            assert_eq!(task.queue, fm_core::Queue::Incoming);
            assert_eq!(task.title, "from action");
        }
        other => panic!("expected completion, got {other:?}"),
    }
}

#[test]
fn pause_and_resume_toggle_the_marker() {
    let h = Harness::new();
    h.server().push_action(action("a1", "pause_scheduler", serde_json::json!({})));
    process_actions(&h.scheduler);
    assert!(h.scheduler.globally_paused());

    h.server().push_action(action("a2", "resume_scheduler", serde_json::json!({})));
    process_actions(&h.scheduler);
    assert!(!h.scheduler.globally_paused());
}

#[test]
fn completed_actions_are_not_redispatched() {
    let h = Harness::new();
    h.server().push_action(action("a1", "ping", serde_json::json!({})));

    process_actions(&h.scheduler);
    process_actions(&h.scheduler);

    // Still completed once; the fake only lists unfinished actions.
    assert!(matches!(h.server().action_state("a1"), Some(ActionState::Completed(_))));
}

#[test]
fn fetch_failure_is_swallowed() {
    let h = Harness::new();
    h.server().set_failing(true);
    process_actions(&h.scheduler);
}

#[test]
fn cancel_task_kills_the_tracked_worker() {
    let h = Harness::new();
    let mut child = std::process::Command::new("sleep").arg("30").spawn().unwrap();
    let pid = child.id() as i32;
    h.scheduler
        .pool
        .register(
            &fm_core::BlueprintName::new("implementer"),
            pid,
            Some(fm_core::TaskId::new("T-1")),
            fm_core::InstanceName::new("implementer-1"),
            &h.clock,
        )
        .unwrap();
    h.server().push_action(action("a1", "cancel_task", serde_json::json!({"task_id": "T-1"})));

    process_actions(&h.scheduler);

    match h.server().action_state("a1") {
        Some(ActionState::Completed(result)) => {
            assert_eq!(result["killed"], true);
            assert_eq!(result["pid"], pid);
        }
        other => panic!("expected completion, got {other:?}"),
    }
    // Reap the killed child; it must be gone.
    let status = child.wait().unwrap();
    assert!(!status.success());
}

#[test]
fn cancel_task_with_unknown_task_reports_not_killed() {
    let h = Harness::new();
    h.server().push_action(action("a1", "cancel_task", serde_json::json!({"task_id": "T-x"})));

    process_actions(&h.scheduler);

    match h.server().action_state("a1") {
        Some(ActionState::Completed(result)) => assert_eq!(result["killed"], false),
        other => panic!("expected completion, got {other:?}"),
    }
}
