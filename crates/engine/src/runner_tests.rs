// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::Harness;
use fm_core::TaskId;

fn claimed_task(h: &Harness) -> Task {
    let task: Task = serde_json::from_value(serde_json::json!({
        "id": "T-1",
        "title": "add feature",
        "description": "do the thing",
        "role": "implement",
        "queue": "claimed",
        "branch": "main",
    }))
    .unwrap();
    h.server().insert(task.clone());
    task
}

fn transition(steps: &[&str], to: &str) -> TransitionDef {
    TransitionDef {
        when: Some("done".to_string()),
        steps: steps.iter().map(|s| s.to_string()).collect(),
        to: to.to_string(),
    }
}

#[test]
fn success_completes_and_leaves_no_counter() {
    let h = Harness::new();
    let mut task = claimed_task(&h);

    let outcome = run_transition_steps(
        &h.scheduler,
        &mut task,
        &ResultArtifact::Done,
        &transition(&["push_branch", "create_pr"], "provisional"),
    )
    .unwrap();

    assert_eq!(outcome, StepsOutcome::Completed);
    assert!(!h.scheduler.runtime.step_failure_count(&TaskId::new("T-1")).exists());
}

#[test]
fn first_failure_increments_counter_and_reraises() {
    let h = Harness::new();
    let mut task = claimed_task(&h);
    h.tools().fail_on("push_branch");

    let result = run_transition_steps(
        &h.scheduler,
        &mut task,
        &ResultArtifact::Done,
        &transition(&["push_branch"], "provisional"),
    );
    assert!(result.is_err());

    let counter = h.scheduler.runtime.step_failure_count(&TaskId::new("T-1"));
    assert_eq!(std::fs::read_to_string(counter).unwrap().trim(), "1");
    // The task is untouched; the PID stays registered for a retry.
    assert_eq!(h.server().task(&TaskId::new("T-1")).unwrap().queue, Queue::Claimed);
}

#[test]
fn third_failure_fails_the_task_and_returns_cleanly() {
    let h = Harness::new();
    let mut task = claimed_task(&h);
    h.tools().fail_on("push_branch");
    let tr = transition(&["push_branch"], "provisional");

    assert!(run_transition_steps(&h.scheduler, &mut task, &ResultArtifact::Done, &tr).is_err());
    assert!(run_transition_steps(&h.scheduler, &mut task, &ResultArtifact::Done, &tr).is_err());
    // Third failure: clean return, task failed, counter gone.
    let outcome =
        run_transition_steps(&h.scheduler, &mut task, &ResultArtifact::Done, &tr).unwrap();

    assert_eq!(outcome, StepsOutcome::GaveUp);
    assert_eq!(h.server().task(&TaskId::new("T-1")).unwrap().queue, Queue::Failed);
    assert!(!h.scheduler.runtime.step_failure_count(&TaskId::new("T-1")).exists());
}

#[test]
fn success_after_failures_resets_the_counter() {
    let h = Harness::new();
    let mut task = claimed_task(&h);
    h.tools().fail_on("push_branch");
    let tr = transition(&["push_branch"], "provisional");

    assert!(run_transition_steps(&h.scheduler, &mut task, &ResultArtifact::Done, &tr).is_err());
    h.tools().clear_failure("push_branch");

    let outcome =
        run_transition_steps(&h.scheduler, &mut task, &ResultArtifact::Done, &tr).unwrap();
    assert_eq!(outcome, StepsOutcome::Completed);
    assert!(!h.scheduler.runtime.step_failure_count(&TaskId::new("T-1")).exists());
}

#[test]
fn later_step_failure_still_counts() {
    let h = Harness::new();
    let mut task = claimed_task(&h);
    h.tools().fail_on("create_pr");

    let result = run_transition_steps(
        &h.scheduler,
        &mut task,
        &ResultArtifact::Done,
        &transition(&["push_branch", "create_pr"], "provisional"),
    );
    assert!(result.is_err());
    let counter = h.scheduler.runtime.step_failure_count(&TaskId::new("T-1"));
    assert_eq!(read_failure_count(&counter), 1);
}

#[test]
fn unknown_step_is_an_error() {
    let h = Harness::new();
    let mut task = claimed_task(&h);
    let result = run_transition_steps(
        &h.scheduler,
        &mut task,
        &ResultArtifact::Done,
        &transition(&["teleport"], "provisional"),
    );
    assert!(matches!(result, Err(EngineError::UnknownStep { .. })));
}
