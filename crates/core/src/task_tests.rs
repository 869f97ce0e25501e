// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    incoming = { "incoming", Queue::Incoming },
    claimed = { "claimed", Queue::Claimed },
    provisional = { "provisional", Queue::Provisional },
    done = { "done", Queue::Done },
    failed = { "failed", Queue::Failed },
    needs_continuation = { "needs_continuation", Queue::NeedsContinuation },
)]
fn queue_parse_and_display_round_trip(name: &str, queue: Queue) {
    assert_eq!(Queue::parse(name), Some(queue));
    assert_eq!(queue.to_string(), name);
}

#[test]
fn queue_parse_rejects_unknown() {
    assert_eq!(Queue::parse("review_pending"), None);
}

#[parameterized(
    done = { Queue::Done, true },
    failed = { Queue::Failed, true },
    incoming = { Queue::Incoming, false },
    claimed = { Queue::Claimed, false },
)]
fn terminal_queues(queue: Queue, terminal: bool) {
    assert_eq!(queue.is_terminal(), terminal);
}

#[test]
fn priority_orders_highest_first() {
    assert!(Priority::Highest < Priority::High);
    assert!(Priority::High < Priority::Low);
}

#[test]
fn task_deserializes_from_minimal_server_payload() {
    let task: Task = serde_json::from_value(serde_json::json!({
        "id": "T-1",
        "role": "implement",
        "queue": "incoming",
    }))
    .unwrap();
    assert_eq!(task.id, "T-1");
    assert_eq!(task.branch, "main");
    assert_eq!(task.priority, Priority::High);
    assert!(!task.is_blocked());
    assert!(task.claimed_by.is_none());
}

#[test]
fn task_with_blockers_is_blocked() {
    let task: Task = serde_json::from_value(serde_json::json!({
        "id": "T-2",
        "role": "implement",
        "queue": "incoming",
        "blocked_by": ["T-1"],
    }))
    .unwrap();
    assert!(task.is_blocked());
}

#[test]
fn task_serialization_omits_absent_optionals() {
    let task: Task = serde_json::from_value(serde_json::json!({
        "id": "T-3",
        "role": "review",
        "queue": "incoming",
    }))
    .unwrap();
    let value = serde_json::to_value(&task).unwrap();
    let obj = value.as_object().unwrap();
    assert!(!obj.contains_key("claimed_by"));
    assert!(!obj.contains_key("lease_expires_at"));
    assert!(!obj.contains_key("pr_number"));
}
