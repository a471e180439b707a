// Copyright 2018-2026 the module_runtime authors. MIT license.

//! The framework handle factory (component C8, spec.md §4.6): the
//! `jest`-object surface a module body sees, bound to the module that
//! currently owns it. Builder-style methods return `&mut Self` for
//! chaining, the idiomatic equivalent of the spec's fluent
//! `this`-returning JS methods.

use std::path::PathBuf;
use std::rc::Rc;

use crate::error::RuntimeError;
use crate::mock::automock;
use crate::mock::policy::MockFactory;
use crate::runtime::Runtime;
use crate::sandbox::FakeTimers;
use crate::sandbox::GlobalValue;
use crate::sandbox::MockFunctionId;
use crate::teardown;

pub struct FrameworkHandle {
  runtime: Runtime,
  current_module: PathBuf,
}

impl FrameworkHandle {
  pub(crate) fn new(runtime: Runtime, current_module: PathBuf) -> Self {
    Self {
      runtime,
      current_module,
    }
  }

  pub fn disable_automock(&mut self) -> &mut Self {
    self.runtime.state.borrow_mut().policy.automock = false;
    self
  }

  pub fn enable_automock(&mut self) -> &mut Self {
    self.runtime.state.borrow_mut().policy.automock = true;
    self
  }

  /// `jest.mock(request, factory?, { virtual? })`.
  pub fn mock(&mut self, request: &str, factory: Option<MockFactory>, virtual_mock: bool) -> &mut Self {
    self.runtime.mock(&self.current_module, request, factory, virtual_mock);
    self
  }

  /// `jest.doMock(request, factory?)` — an alias kept distinct from
  /// `mock` because, unlike `mock`, a real Jest never hoists it above
  /// imports; this crate has no hoisting pass at all, so the two are
  /// identical here.
  pub fn do_mock(&mut self, request: &str, factory: Option<MockFactory>) -> &mut Self {
    self.mock(request, factory, false)
  }

  pub fn unmock(&mut self, request: &str) -> &mut Self {
    self.runtime.unmock(&self.current_module, request);
    self
  }

  pub fn dont_mock(&mut self, request: &str) -> &mut Self {
    self.unmock(request)
  }

  pub fn deep_unmock(&mut self, request: &str) -> &mut Self {
    self.runtime.deep_unmock(&self.current_module, request);
    self
  }

  /// `jest.setMock(request, value)`.
  pub fn set_mock(&mut self, request: &str, value: GlobalValue) -> &mut Self {
    self.runtime.set_mock(&self.current_module, request, value.cell());
    self
  }

  pub fn reset_modules(&mut self) -> &mut Self {
    self.runtime.reset_modules();
    self
  }

  pub fn reset_module_registry(&mut self) -> &mut Self {
    self.reset_modules()
  }

  /// `jest.isolateModules(fn)`.
  pub fn isolate_modules(
    &mut self,
    body: impl FnOnce(&Runtime),
  ) -> Result<&mut Self, RuntimeError> {
    self.runtime.isolate_modules(body)?;
    Ok(self)
  }

  /// `jest.genMockFromModule(request)`: synthesizes an auto-mock from
  /// `request`'s real shape without registering it anywhere. Runs the
  /// real module in scratch registries for the same reason the
  /// implicit auto-mock path does (see `Runtime::with_scratch_registries`):
  /// its top-level side effects must never reach the registries the
  /// running test observes.
  pub fn gen_mock_from_module(&self, request: &str) -> Result<GlobalValue, RuntimeError> {
    let current_module = &self.current_module;
    let runtime = &self.runtime;
    let metadata = runtime.with_scratch_registries(|| {
      let real = runtime.require_actual(current_module, request)?;
      let mocker = runtime.sandbox.module_mocker();
      let captured = real.borrow();
      Ok(
        mocker
          .get_metadata(&captured)
          .unwrap_or_else(|| automock::metadata_from_value(&captured)),
      )
    })?;
    let mocker = self.runtime.sandbox.module_mocker();
    Ok(automock::regenerate(&metadata, mocker))
  }

  pub fn fn_mock(&self) -> MockFunctionId {
    self.runtime.sandbox.module_mocker().fn_mock()
  }

  pub fn spy_on(&self, object_key: &str, method: &str) -> MockFunctionId {
    self.runtime.sandbox.module_mocker().spy_on(object_key, method)
  }

  pub fn is_mock_function(&self, id: MockFunctionId) -> bool {
    self.runtime.sandbox.module_mocker().is_mock_function(id)
  }

  pub fn clear_all_mocks(&mut self) -> &mut Self {
    self.runtime.clear_all_mocks();
    self
  }

  pub fn reset_all_mocks(&mut self) -> &mut Self {
    self.runtime.reset_all_mocks();
    self
  }

  pub fn restore_all_mocks(&mut self) -> &mut Self {
    self.runtime.restore_all_mocks();
    self
  }

  /// `jest.useFakeTimers()`: installs fake timers on the sandbox. A
  /// torn-down sandbox never throws (spec.md §4.8); it logs and marks
  /// the exit code, same as the other timer operations in this table.
  pub fn use_fake_timers(&mut self) -> &mut Self {
    self.guarded_sandbox(|sandbox| sandbox.install_fake_timers());
    self
  }

  /// `jest.useRealTimers()`: uninstalls fake timers, reverting to the
  /// sandbox's native timer implementation.
  pub fn use_real_timers(&mut self) -> &mut Self {
    self.guarded_sandbox(|sandbox| sandbox.use_real_timers());
    self
  }

  fn guarded_sandbox(&self, f: impl FnOnce(&dyn crate::sandbox::Sandbox)) {
    if teardown::is_torn_down(self.runtime.sandbox.as_ref()) {
      let code = teardown::log_disposed(&self.current_module.to_string_lossy());
      self.runtime.set_exit_code(code);
      return;
    }
    f(self.runtime.sandbox.as_ref());
  }

  fn guarded_timers(&self, f: impl FnOnce(&dyn FakeTimers)) {
    if teardown::is_torn_down(self.runtime.sandbox.as_ref()) {
      let code = teardown::log_disposed(&self.current_module.to_string_lossy());
      self.runtime.set_exit_code(code);
      return;
    }
    if let Some(timers) = self.runtime.sandbox.fake_timers() {
      f(timers);
    }
  }

  pub fn advance_timers_by_time(&mut self, ms: u64) -> &mut Self {
    self.guarded_timers(|t| t.advance_by_time(ms));
    self
  }

  pub fn run_all_timers(&mut self) -> &mut Self {
    self.guarded_timers(|t| t.run_all_timers());
    self
  }

  pub fn run_all_ticks(&mut self) -> &mut Self {
    self.guarded_timers(|t| t.run_all_ticks());
    self
  }

  pub fn run_all_immediates(&mut self) -> &mut Self {
    self.guarded_timers(|t| t.run_all_immediates());
    self
  }

  pub fn run_only_pending_timers(&mut self) -> &mut Self {
    self.guarded_timers(|t| t.run_only_pending_timers());
    self
  }

  pub fn clear_all_timers(&mut self) -> &mut Self {
    self.guarded_timers(|t| t.clear_all_timers());
    self
  }

  pub fn get_timer_count(&self) -> usize {
    self
      .runtime
      .sandbox
      .fake_timers()
      .map(|t| t.timer_count())
      .unwrap_or(0)
  }

  /// `jest.setTimeout(ms)`: the default per-test timeout. Stored, not
  /// enforced — scheduling a test's wall-clock budget is the embedding
  /// framework's job, not this crate's (spec.md §1 Non-goals:
  /// cross-file scheduling).
  pub fn set_timeout(&mut self, ms: u64) -> &mut Self {
    self.runtime.set_test_timeout(ms);
    self
  }

  pub fn retry_times(&mut self, n: u32) -> &mut Self {
    self.runtime.set_retry_times(n);
    self
  }

  pub fn require_actual(&self, request: &str) -> Result<Rc<std::cell::RefCell<GlobalValue>>, RuntimeError> {
    self.runtime.require_actual(&self.current_module, request)
  }

  pub fn require_mock(&self, request: &str) -> Result<Rc<std::cell::RefCell<GlobalValue>>, RuntimeError> {
    self.runtime.require_mock(&self.current_module, request)
  }

  /// `jest.addMatchers(...)`: records the registration only. Building
  /// an assertion-matching engine is out of scope (spec.md §1
  /// Non-goals: assertion matchers); this is the pass-through slot a
  /// host assertion library would hang its own matcher lookup off of.
  pub fn add_matchers(&mut self, matchers: std::collections::HashMap<String, GlobalValue>) -> &mut Self {
    for (name, value) in matchers {
      self.runtime.register_matcher(name, value);
    }
    self
  }
}
