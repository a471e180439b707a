// Copyright 2018-2026 the module_runtime authors. MIT license.

//! Teardown guard (component C10, spec.md §4.8). A torn-down sandbox
//! is the one failure mode the spec insists must never be thrown: the
//! executor checks for disposal on every entry, the framework
//! handle's timer operations re-check before touching sandbox state,
//! and runtime-originated error stacks are filtered to drop this
//! crate's own frames before they reach the user.

use crate::sandbox::Sandbox;

/// Checked at the top of every executor entry and before every
/// fake-timer call routed through the framework handle.
pub fn is_torn_down(sandbox: &dyn Sandbox) -> bool {
  sandbox.is_disposed()
}

/// Logs the formatted reference error the spec requires when a call
/// observes a torn-down sandbox, and returns the process exit code
/// that should be recorded (spec.md §4.4 step 5, §4.6 timer table).
pub fn log_disposed(context: &str) -> i32 {
  log::error!(
    "ReferenceError: You are trying to access '{context}' on a sandbox \
     that has already been torn down. Did you run code that tried to \
     access the global environment after the test finished?"
  );
  1
}

/// Drops frames originating from this crate's own modules, preserving
/// only user-relevant frames, matching the teacher's
/// `fmt_errors::format_error_message` posture of cleaning up a raw
/// engine stack before it reaches the user.
pub fn strip_runtime_frames(stack: &str) -> String {
  stack
    .lines()
    .filter(|line| !line.contains("module_runtime::"))
    .collect::<Vec<_>>()
    .join("\n")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn strips_only_runtime_frames() {
    let stack = "at userCode (app.js:1:1)\n\
                 at module_runtime::executor::execute_module (executor.rs:10)\n\
                 at main (app.js:5:1)";
    let filtered = strip_runtime_frames(stack);
    assert!(filtered.contains("userCode"));
    assert!(filtered.contains("main"));
    assert!(!filtered.contains("module_runtime::"));
  }
}
