// Copyright 2018-2026 the module_runtime authors. MIT license.

//! The module executor (component C6, spec.md §4.4): runs a
//! pre-allocated module's compiled body with the fixed synthetic
//! argument order the spec requires.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::rc::Rc;

use crate::error::RuntimeError;
use crate::handle::FrameworkHandle;
use crate::module::Module;
use crate::registry::Layer;
use crate::require::LocalRequire;
use crate::runtime::Runtime;
use crate::sandbox::GlobalValue;
use crate::sandbox::Sandbox;
use crate::teardown;
use crate::transform::TransformOptions;

/// The synthetic arguments a module body is invoked with. The spec's
/// fixed positional order (`module, exports, require, __dirname,
/// __filename, global, framework-handle, ...extraGlobals`) becomes
/// field order here — `Sandbox` implementations are contractually
/// expected to bind them to the target engine's call convention in
/// this order (documented on [`crate::sandbox::Sandbox::run_script`]).
pub struct ExecArgs<'a> {
  pub module: Rc<RefCell<Module>>,
  pub exports: Rc<RefCell<GlobalValue>>,
  pub require: LocalRequire,
  pub dirname: PathBuf,
  pub filename: PathBuf,
  /// The sandbox's global environment itself (spec.md §4.4 step 6's
  /// 6th synthetic argument) — not a snapshot like `extra_globals`,
  /// but a handle onto the same named property bag `get_global`/
  /// `set_global` read and write for the lifetime of the sandbox.
  pub global: Rc<dyn Sandbox>,
  pub framework_handle: FrameworkHandle,
  pub extra_globals: HashMap<String, GlobalValue>,
  _marker: std::marker::PhantomData<&'a ()>,
}

impl<'a> ExecArgs<'a> {
  #[allow(clippy::too_many_arguments)]
  fn new(
    module: Rc<RefCell<Module>>,
    exports: Rc<RefCell<GlobalValue>>,
    require: LocalRequire,
    dirname: PathBuf,
    filename: PathBuf,
    global: Rc<dyn Sandbox>,
    framework_handle: FrameworkHandle,
    extra_globals: HashMap<String, GlobalValue>,
  ) -> Self {
    Self {
      module,
      exports,
      require,
      dirname,
      filename,
      global,
      framework_handle,
      extra_globals,
      _marker: std::marker::PhantomData,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecOutcome {
  Completed,
  /// The sandbox was torn down either before or during this call. The
  /// spec requires this is never represented as an error.
  TornDown,
}

/// Explicit save/restore of the two pieces of ambient state the
/// executor threads across a call (spec.md §9's design note on
/// replacing `this._currently...` fields): the currently-executing
/// module path, and whether that module is a manual mock. Restored on
/// drop even if executing the body returns an error, matching the
/// spec's "scoped-acquisition idiom" guidance.
pub struct ExecutionGuard {
  runtime: Runtime,
  previous_path: Option<PathBuf>,
  previous_is_manual_mock: bool,
}

impl ExecutionGuard {
  fn enter(runtime: &Runtime, path: PathBuf, is_manual_mock: bool) -> Self {
    let (previous_path, previous_is_manual_mock) = {
      let mut state = runtime.state.borrow_mut();
      let previous = (
        state.currently_executing_path.take(),
        state.currently_executing_is_manual_mock,
      );
      state.currently_executing_path = Some(path);
      state.currently_executing_is_manual_mock = is_manual_mock;
      previous
    };
    Self {
      runtime: runtime.clone(),
      previous_path,
      previous_is_manual_mock,
    }
  }
}

impl Drop for ExecutionGuard {
  fn drop(&mut self) {
    let mut state = self.runtime.state.borrow_mut();
    state.currently_executing_path = self.previous_path.take();
    state.currently_executing_is_manual_mock = self.previous_is_manual_mock;
  }
}

/// Executes `module`'s body. `module` must already be inserted into
/// `layer` (the invariant from spec.md §3: insertion happens before
/// execution, so cyclic requires observe partial exports).
pub fn execute_module(
  runtime: &Runtime,
  module: Rc<RefCell<Module>>,
  layer: Layer,
  is_internal: bool,
) -> Result<ExecOutcome, RuntimeError> {
  // Step 1: entry-point teardown check (component C10). No throw —
  // the caller gets told via `ExecOutcome::TornDown`.
  if teardown::is_torn_down(runtime.sandbox.as_ref()) {
    let path = module.borrow().filename.clone();
    let code = teardown::log_disposed(&path.to_string_lossy());
    runtime.state.borrow_mut().exit_code = code;
    return Ok(ExecOutcome::TornDown);
  }

  let path = module.borrow().filename.clone();
  let is_manual_mock = module.borrow().kind == crate::module::RequireKind::ManualMock;
  log::debug!("executing {} (layer={layer:?})", path.display());

  // Step 2: ambient save/restore.
  let _guard = ExecutionGuard::enter(runtime, path.clone(), is_manual_mock);

  // Step 3: require factory + paths for this module.
  let require = LocalRequire::new(runtime.clone(), path.clone(), is_internal);
  let dirname = path
    .parent()
    .map(Path::to_path_buf)
    .unwrap_or_else(|| PathBuf::from("/"));

  // Step 4: ask the transform cache for a compiled script, recording
  // any produced source map with the source-map registry (C9).
  let options = TransformOptions {
    transform_name: runtime
      .config
      .transform_for(&path)
      .map(|t| t.transform_name.clone()),
    collect_coverage: runtime.config.collect_coverage,
  };
  let source_text = runtime
    .resolver
    .read_source(&path)
    .map_err(|source| RuntimeError::Transform {
      path: path.clone(),
      source: crate::transform::TransformError::Read {
        path: path.clone(),
        source,
      },
    })?;
  let output = runtime
    .transform_cache
    .transform(&path, &options, Some(&source_text))
    .map_err(|source| RuntimeError::Transform {
      path: path.clone(),
      source,
    })?;
  if let Some(map_path) = output.script.source_map_path.clone() {
    runtime.state.borrow_mut().source_maps.register(
      path.clone(),
      map_path,
      output.script.needs_coverage_map,
    );
  }

  // Extra globals are pulled by name before invocation; a missing name
  // fails loudly rather than silently passing `undefined` (spec.md
  // §4.4 step 6).
  let mut extra_globals = HashMap::new();
  for name in &runtime.config.extra_globals {
    match runtime.sandbox.get_global(name) {
      Some(value) => {
        extra_globals.insert(name.clone(), value);
      }
      None => {
        return Err(RuntimeError::MissingExtraGlobal { name: name.clone() });
      }
    }
  }

  let exports = module.borrow().exports.clone();
  let framework_handle = FrameworkHandle::new(runtime.clone(), path.clone());
  let filename = path.clone();
  let mut args = ExecArgs::new(
    module.clone(),
    exports,
    require,
    dirname,
    filename,
    runtime.sandbox.clone(),
    framework_handle,
    extra_globals,
  );

  // Step 5/6: evaluate and invoke. Nothing in this crate's own frame
  // holds a `RefCell` borrow of `runtime.state` across this call —
  // the module body, through `args.require`, may reenter the runtime
  // to require further modules.
  match runtime.sandbox.run_script(&output.script, &mut args) {
    None => {
      let code = teardown::log_disposed(&path.to_string_lossy());
      runtime.state.borrow_mut().exit_code = code;
      Ok(ExecOutcome::TornDown)
    }
    Some(Err(err)) => Err(RuntimeError::Sandbox(err)),
    Some(Ok(())) => {
      module.borrow_mut().loaded = true;
      Ok(ExecOutcome::Completed)
    }
  }
}
