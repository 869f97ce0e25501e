// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PID liveness probes and worker cancellation.

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

/// Whether a process with the given PID is running.
///
/// Sends signal 0, which checks existence without affecting the target.
/// EPERM means the process exists but belongs to another user, so it
/// counts as alive.
pub fn alive(pid: i32) -> bool {
    if pid <= 0 {
        return false;
    }
    match kill(Pid::from_raw(pid), None) {
        Ok(()) => true,
        Err(nix::errno::Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// Hard-kill a worker. Cancellation in the core is "SIGKILL; the finish
/// sweep picks the task up on the next tick". There is no soft cancel.
pub fn kill_worker(pid: i32) -> bool {
    if pid <= 0 {
        return false;
    }
    kill(Pid::from_raw(pid), Signal::SIGKILL).is_ok()
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
