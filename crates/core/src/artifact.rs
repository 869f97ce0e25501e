// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Result artifacts left behind by workers.
//!
//! A worker communicates its outcome back to the scheduler through a
//! single `result.json` in its task directory. The recognised shapes are
//! fixed; anything else collapses into [`ResultArtifact::Error`] so the
//! result handler has exactly one failure path.

use serde::{Deserialize, Serialize};

/// Gatekeeper verdict on a provisional task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

crate::simple_display! {
    ReviewDecision {
        Approve => "approve",
        Reject => "reject",
    }
}

/// Parsed `result.json`, tagged over the shapes a worker may produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultArtifact {
    /// Implementer finished: `{"outcome": "done"}`.
    Done,
    /// Implementer gave up: `{"outcome": "failed", "reason": ...}`.
    Failed { reason: String },
    /// Implementer hit a budget cap: `{"outcome": "needs_continuation"}`.
    NeedsContinuation,
    /// Reviewer verdict: `{"status": "success", "decision": ..., "comment": ...}`.
    Review { decision: ReviewDecision, comment: String },
    /// Malformed or unrecognised payload.
    Error { detail: String },
}

impl ResultArtifact {
    /// Parse raw `result.json` bytes.
    ///
    /// Never fails: unparseable JSON and unknown shapes become
    /// [`ResultArtifact::Error`] with a diagnostic detail.
    pub fn parse(raw: &str) -> ResultArtifact {
        let value: serde_json::Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                return ResultArtifact::Error { detail: format!("unparseable result.json: {e}") }
            }
        };

        let Some(obj) = value.as_object() else {
            return ResultArtifact::Error { detail: "result.json is not an object".to_string() };
        };

        if let Some(outcome) = obj.get("outcome").and_then(|v| v.as_str()) {
            return match outcome {
                "done" => ResultArtifact::Done,
                "failed" => ResultArtifact::Failed {
                    reason: obj
                        .get("reason")
                        .and_then(|v| v.as_str())
                        .unwrap_or("unspecified")
                        .to_string(),
                },
                "needs_continuation" => ResultArtifact::NeedsContinuation,
                other => {
                    ResultArtifact::Error { detail: format!("unknown outcome: {other:?}") }
                }
            };
        }

        if obj.get("status").and_then(|v| v.as_str()) == Some("success") {
            let comment = obj
                .get("comment")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            return match obj.get("decision").and_then(|v| v.as_str()) {
                Some("approve") => {
                    ResultArtifact::Review { decision: ReviewDecision::Approve, comment }
                }
                Some("reject") => {
                    ResultArtifact::Review { decision: ReviewDecision::Reject, comment }
                }
                other => {
                    ResultArtifact::Error { detail: format!("unknown decision: {other:?}") }
                }
            };
        }

        ResultArtifact::Error { detail: "unrecognised result shape".to_string() }
    }

    /// Short tag for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ResultArtifact::Done => "done",
            ResultArtifact::Failed { .. } => "failed",
            ResultArtifact::NeedsContinuation => "needs_continuation",
            ResultArtifact::Review { .. } => "review",
            ResultArtifact::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
#[path = "artifact_tests.rs"]
mod tests;
