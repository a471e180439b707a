// Copyright 2018-2026 the module_runtime authors. MIT license.

//! The sandbox is an external collaborator (component C3): an isolated
//! global environment, real/fake timers, and a `run_script` primitive.
//! The runtime never constructs one itself — it is handed a `Sandbox`
//! implementation the way the teacher's worker is handed a `JsRuntime`
//! plus a `ModuleLoaderFactory` (`cli/lib/worker.rs`); this crate's own
//! tests use an in-memory reference implementation (`testing` module).

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::executor::ExecArgs;
use crate::transform::CompiledScript;

#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
  #[error("{0}")]
  ExecutionFailed(String),
  #[error("fake timers are not installed")]
  FakeTimersNotInstalled,
}

/// A value living on the sandbox global. Modeled as a small JSON-like
/// tree of shared, mutable nodes (rather than `serde_json::Value`) so
/// that `Runtime::get_all_coverage_info_copy` can exercise genuine
/// cycle tolerance (spec.md Testable Properties): two `Object` nodes
/// may legitimately point back at each other.
#[derive(Debug, Clone)]
pub enum GlobalValue {
  Null,
  Bool(bool),
  Number(f64),
  String(String),
  Array(Vec<Rc<RefCell<GlobalValue>>>),
  Object(HashMap<String, Rc<RefCell<GlobalValue>>>),
}

impl GlobalValue {
  pub fn cell(self) -> Rc<RefCell<GlobalValue>> {
    Rc::new(RefCell::new(self))
  }

  /// A deep copy that tolerates cycles: a node already visited on the
  /// current path is copied as an empty placeholder of the same shape
  /// rather than followed again.
  pub fn deep_copy(&self) -> GlobalValue {
    let mut seen = Vec::new();
    deep_copy_inner(self, &mut seen)
  }
}

fn deep_copy_inner(
  value: &GlobalValue,
  seen: &mut Vec<*const RefCell<GlobalValue>>,
) -> GlobalValue {
  match value {
    GlobalValue::Null => GlobalValue::Null,
    GlobalValue::Bool(b) => GlobalValue::Bool(*b),
    GlobalValue::Number(n) => GlobalValue::Number(*n),
    GlobalValue::String(s) => GlobalValue::String(s.clone()),
    GlobalValue::Array(items) => {
      GlobalValue::Array(items.iter().map(|item| copy_cell(item, seen)).collect())
    }
    GlobalValue::Object(fields) => GlobalValue::Object(
      fields
        .iter()
        .map(|(k, v)| (k.clone(), copy_cell(v, seen)))
        .collect(),
    ),
  }
}

fn copy_cell(
  cell: &Rc<RefCell<GlobalValue>>,
  seen: &mut Vec<*const RefCell<GlobalValue>>,
) -> Rc<RefCell<GlobalValue>> {
  let ptr = Rc::as_ptr(cell);
  if seen.contains(&ptr) {
    // cycle: stop descending, substitute an empty shell of the same kind
    let shell = match &*cell.borrow() {
      GlobalValue::Array(_) => GlobalValue::Array(Vec::new()),
      GlobalValue::Object(_) => GlobalValue::Object(HashMap::new()),
      other => deep_copy_inner(other, seen),
    };
    return shell.cell();
  }
  seen.push(ptr);
  let copied = deep_copy_inner(&cell.borrow(), seen);
  seen.pop();
  copied.cell()
}

/// Pass-through surface for the mock-function subsystem the framework
/// handle (C8) delegates `fn`/`spyOn`/`clearAllMocks`/etc. to.
pub trait ModuleMocker {
  fn fn_mock(&self) -> MockFunctionId;
  fn spy_on(&self, object_key: &str, method: &str) -> MockFunctionId;
  fn is_mock_function(&self, id: MockFunctionId) -> bool;
  fn clear_all_mocks(&self);
  fn reset_all_mocks(&self);
  fn restore_all_mocks(&self);
  /// Structural metadata for auto-mock synthesis (C5): a snapshot of
  /// `value`'s shape (function/object/array/primitive), not the
  /// value itself.
  fn get_metadata(
    &self,
    value: &GlobalValue,
  ) -> Option<crate::mock::automock::MockMetadata>;
  fn generate_from_metadata(
    &self,
    metadata: &crate::mock::automock::MockMetadata,
  ) -> GlobalValue;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MockFunctionId(pub u64);

/// Pass-through surface for fake timers (C8).
pub trait FakeTimers {
  fn advance_by_time(&self, ms: u64);
  fn run_all_timers(&self);
  fn run_all_ticks(&self);
  fn run_all_immediates(&self);
  fn run_only_pending_timers(&self);
  fn clear_all_timers(&self);
  fn timer_count(&self) -> usize;
}

/// The isolated global environment a module body executes against.
/// `Sandbox::global` in the spec ("possibly null after teardown") is
/// represented here as `is_disposed`, consulted by the Teardown Guard
/// (C10) on every executor entry and before every timer call routed
/// through the framework handle.
pub trait Sandbox {
  fn is_disposed(&self) -> bool;

  /// Compile-and-run the module's top-level body. Returns `None` if
  /// the sandbox was disposed between the executor's entry check and
  /// this call (the only suspension point within a single require);
  /// the spec requires this case never be thrown, only logged.
  fn run_script(
    &self,
    script: &CompiledScript,
    args: &mut ExecArgs<'_>,
  ) -> Option<Result<(), SandboxError>>;

  fn get_global(&self, name: &str) -> Option<GlobalValue>;
  fn set_global(&self, name: &str, value: GlobalValue);

  fn module_mocker(&self) -> &dyn ModuleMocker;
  fn fake_timers(&self) -> Option<&dyn FakeTimers>;

  /// `jest.useFakeTimers()`: installs fake timers, after which
  /// [`Sandbox::fake_timers`] must return `Some`.
  fn install_fake_timers(&self);
  /// `jest.useRealTimers()`: uninstalls fake timers, after which
  /// [`Sandbox::fake_timers`] must return `None`.
  fn use_real_timers(&self);

  fn setup(&mut self) -> Result<(), SandboxError>;
  fn teardown(&mut self);
}

/// A `Sandbox` implementation backed by a real engine is expected to
/// intercept user code's `process.exit(...)` call and invoke
/// [`crate::runtime::Runtime::handle_process_exit`] with the call's
/// stringified arguments and the current stack, rather than letting
/// the process exit immediately — spec.md §7's last disposition row.
/// This is a contract on the embedder, not a method on this trait:
/// `Sandbox` has no reference back to the owning `Runtime`, so the
/// callback is reached through whatever mechanism the embedder's
/// engine binding already uses to call back into Rust.
