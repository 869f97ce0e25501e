// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn parses_done() {
    assert_eq!(ResultArtifact::parse(r#"{"outcome": "done"}"#), ResultArtifact::Done);
}

#[test]
fn parses_failed_with_reason() {
    let artifact = ResultArtifact::parse(r#"{"outcome": "failed", "reason": "tests red"}"#);
    assert_eq!(artifact, ResultArtifact::Failed { reason: "tests red".to_string() });
}

#[test]
fn parses_failed_without_reason() {
    let artifact = ResultArtifact::parse(r#"{"outcome": "failed"}"#);
    assert_eq!(artifact, ResultArtifact::Failed { reason: "unspecified".to_string() });
}

#[test]
fn parses_needs_continuation() {
    let artifact = ResultArtifact::parse(r#"{"outcome": "needs_continuation"}"#);
    assert_eq!(artifact, ResultArtifact::NeedsContinuation);
}

#[test]
fn parses_reviewer_approval() {
    let artifact =
        ResultArtifact::parse(r#"{"status": "success", "decision": "approve", "comment": "LGTM"}"#);
    assert_eq!(
        artifact,
        ResultArtifact::Review { decision: ReviewDecision::Approve, comment: "LGTM".to_string() }
    );
}

#[test]
fn parses_reviewer_rejection() {
    let artifact =
        ResultArtifact::parse(r#"{"status": "success", "decision": "reject", "comment": "nope"}"#);
    assert_eq!(
        artifact,
        ResultArtifact::Review { decision: ReviewDecision::Reject, comment: "nope".to_string() }
    );
}

#[test]
fn unknown_outcome_is_error() {
    let artifact = ResultArtifact::parse(r#"{"outcome": "shrug"}"#);
    assert!(matches!(artifact, ResultArtifact::Error { .. }));
}

#[test]
fn unknown_decision_is_error() {
    let artifact = ResultArtifact::parse(r#"{"status": "success", "decision": "maybe"}"#);
    assert!(matches!(artifact, ResultArtifact::Error { .. }));
}

#[test]
fn garbage_is_error() {
    assert!(matches!(ResultArtifact::parse("not json"), ResultArtifact::Error { .. }));
    assert!(matches!(ResultArtifact::parse("[1, 2]"), ResultArtifact::Error { .. }));
    assert!(matches!(ResultArtifact::parse("{}"), ResultArtifact::Error { .. }));
}

#[test]
fn parsing_is_deterministic() {
    // The result handler may run twice on late deliveries; the parse must
    // not depend on anything but the bytes.
    let raw = r#"{"outcome": "done"}"#;
    assert_eq!(ResultArtifact::parse(raw), ResultArtifact::parse(raw));
}
