// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Merge conflict detected at review time.

use crate::prelude::*;
use fm_engine::MergeState;

fn provisional_with_pr(h: &Harness) {
    let task: Task = serde_json::from_value(serde_json::json!({
        "id": "T-1",
        "title": "conflicted work",
        "description": "needs a rebase",
        "role": "implement",
        "queue": "provisional",
        "branch": "main",
        "pr_number": 55,
        "pr_url": "https://example.test/pr/55",
    }))
    .unwrap();
    h.server().insert(task);
}

#[test]
fn conflicting_pr_bounces_back_to_incoming_with_rebase_feedback() {
    let mut h = Harness::new();
    h.set_agents(STANDARD_AGENTS);
    provisional_with_pr(&h);
    h.tools().set_mergeable(MergeState::Conflicting);

    let stats = tick(&mut h);

    // No reviewer was spawned for the conflicted task.
    assert_eq!(stats.spawned, 0);
    let task = h.server().task(&TaskId::new("T-1")).unwrap();
    assert_eq!(task.queue, Queue::Incoming);
    assert_eq!(task.attempt_count, 1);

    let feedback = h.server().feedback_for(&TaskId::new("T-1")).join("\n");
    assert!(feedback.contains("git rebase"), "feedback: {feedback}");
    assert!(feedback.contains("main"), "feedback: {feedback}");
}

#[test]
fn mergeable_pr_gets_a_reviewer() {
    let mut h = Harness::new();
    h.set_agents(STANDARD_AGENTS);
    provisional_with_pr(&h);
    h.tools().set_mergeable(MergeState::Mergeable);

    let stats = tick(&mut h);

    assert_eq!(stats.spawned, 1);
    assert_eq!(queue_of(&h, "T-1"), Queue::Provisional);
    assert_eq!(
        h.scheduler
            .pool
            .load(&fm_core::BlueprintName::new("gatekeeper"))
            .values()
            .next()
            .and_then(|e| e.task_id.clone()),
        Some(TaskId::new("T-1"))
    );
}
