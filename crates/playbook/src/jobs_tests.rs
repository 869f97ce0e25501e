// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn write_jobs(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("jobs.yaml");
    std::fs::write(&path, contents).unwrap();
    (dir, path)
}

#[test]
fn parses_standard_job_list() {
    let (_dir, path) = write_jobs(
        r#"
jobs:
  - name: finish_sweep
    group: local
  - name: lease_monitor
    interval: 60
  - name: github_issue_poll
    interval: 900
  - name: queue_summariser
    type: agent
    group: local
    blueprint: summariser
    max_instances: 2
    interval: 3600
    config:
      prompt: summarise the queue
"#,
    );
    let jobs = load_jobs(&path).unwrap();
    assert_eq!(jobs.len(), 4);

    assert_eq!(jobs[0].job_type, JobType::Script);
    assert_eq!(jobs[0].group, JobGroup::Local);
    assert_eq!(jobs[0].interval, 60);

    assert_eq!(jobs[1].group, JobGroup::Remote);

    assert_eq!(jobs[3].job_type, JobType::Agent);
    assert_eq!(jobs[3].blueprint_name(), "summariser");
    assert_eq!(jobs[3].max_instances, 2);
    assert_eq!(
        jobs[3].config.get("prompt").and_then(|v| v.as_str()),
        Some("summarise the queue")
    );
}

#[test]
fn blueprint_defaults_to_job_name() {
    let (_dir, path) = write_jobs("jobs:\n  - name: poller\n    type: agent\n");
    let jobs = load_jobs(&path).unwrap();
    assert_eq!(jobs[0].blueprint_name(), "poller");
}

#[test]
fn missing_file_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_jobs(&dir.path().join("jobs.yaml")).unwrap().is_empty());
}

#[test]
fn malformed_file_is_fatal() {
    let (_dir, path) = write_jobs("jobs: {oops}");
    assert!(matches!(load_jobs(&path), Err(PlaybookError::Yaml { .. })));
}
