// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn current_process_is_alive() {
    assert!(alive(std::process::id() as i32));
}

#[test]
fn nonexistent_pid_is_dead() {
    // Far beyond any real pid_max.
    assert!(!alive(999_999_999));
}

#[test]
fn nonpositive_pids_are_dead() {
    // kill(0)/kill(-1) address process groups, never a worker.
    assert!(!alive(0));
    assert!(!alive(-1));
}

#[test]
fn exited_child_is_dead() {
    let mut child = std::process::Command::new("true").spawn().unwrap();
    let pid = child.id() as i32;
    child.wait().unwrap();
    assert!(!alive(pid));
}
