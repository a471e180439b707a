// Copyright 2018-2026 the module_runtime authors. MIT license.

//! The runtime proper: wires the resolver, sandbox, transform cache
//! and the registries/policy tables (C4/C5/C9) together, and exposes
//! the public operation surface (spec.md §6). Grounded on the
//! teacher's `LibMainWorker`/`LibMainWorkerFactory` split
//! (`cli/lib/worker.rs`): a cheaply-clonable handle wrapping injected
//! collaborators plus an `Rc<RefCell<_>>` of the bookkeeping state that
//! reentrant calls (through `require`/the framework handle) need to
//! share.

use std::cell::RefCell;
use std::collections::HashMap;
use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;
use std::rc::Rc;

use crate::config::RuntimeConfig;
use crate::error::RuntimeError;
use crate::executor;
use crate::mock::policy::MockFactory;
use crate::mock::policy::PolicyTables;
use crate::mock::registry::MockRegistrySet;
use crate::module::Module;
use crate::module::RequireKind;
use crate::registry::Layer;
use crate::registry::RegistrySet;
use crate::resolver::ModuleId;
use crate::resolver::ResolveOptions;
use crate::resolver::Resolver;
use crate::resolver::ResolverError;
use crate::sandbox::GlobalValue;
use crate::sandbox::Sandbox;
use crate::source_map::SourceMapRegistry;
use crate::teardown;
use crate::transform::TransformSource;

/// Bookkeeping mutated across reentrant calls. Split out from
/// `Runtime` itself so the injected collaborators (`resolver`,
/// `sandbox`, `transform_cache`), which manage their own interior
/// mutability if any, never need to share this `RefCell`.
pub(crate) struct RuntimeState {
  pub registries: RegistrySet,
  pub mock_registries: MockRegistrySet,
  pub policy: PolicyTables,
  pub source_maps: SourceMapRegistry,
  pub currently_executing_path: Option<PathBuf>,
  pub currently_executing_is_manual_mock: bool,
  pub exit_code: i32,
  pub test_timeout_ms: u64,
  pub retry_times: u32,
  /// Names registered through `addMatchers`. This crate records the
  /// registration only — evaluating assertions is out of scope.
  pub custom_matchers: HashMap<String, GlobalValue>,
}

/// The runtime's public entry point. Cheap to clone: every field is an
/// `Rc`, so `LocalRequire` and `FrameworkHandle` each hold their own
/// clone rather than borrowing a `&Runtime` across reentrant calls.
#[derive(Clone)]
pub struct Runtime {
  pub(crate) resolver: Rc<dyn Resolver>,
  pub(crate) sandbox: Rc<dyn Sandbox>,
  pub(crate) transform_cache: Rc<dyn TransformSource>,
  pub(crate) config: Rc<RuntimeConfig>,
  pub(crate) state: Rc<RefCell<RuntimeState>>,
}

impl Runtime {
  pub fn new(
    config: RuntimeConfig,
    resolver: Rc<dyn Resolver>,
    sandbox: Rc<dyn Sandbox>,
    transform_cache: Rc<dyn TransformSource>,
  ) -> Self {
    let automock = config.automock;
    let state = RuntimeState {
      registries: RegistrySet::default(),
      mock_registries: MockRegistrySet::default(),
      policy: PolicyTables {
        automock,
        ..Default::default()
      },
      source_maps: SourceMapRegistry::default(),
      currently_executing_path: None,
      currently_executing_is_manual_mock: false,
      exit_code: 0,
      test_timeout_ms: 5_000,
      retry_times: 0,
      custom_matchers: HashMap::new(),
    };
    Self {
      resolver,
      sandbox,
      transform_cache,
      config: Rc::new(config),
      state: Rc::new(RefCell::new(state)),
    }
  }

  pub fn config(&self) -> &RuntimeConfig {
    &self.config
  }

  pub fn exit_code(&self) -> i32 {
    self.state.borrow().exit_code
  }

  pub(crate) fn set_exit_code(&self, code: i32) {
    self.state.borrow_mut().exit_code = code;
  }

  pub(crate) fn module_id_for(&self, from: &Path, request: &str) -> ModuleId {
    let state = self.state.borrow();
    self
      .resolver
      .get_module_id(&state.policy.virtual_mocks, from, Some(request))
  }

  /// spec.md §4.5: `require.resolve` "use[s] the default resolver,
  /// falling back to any registered mock path" — a virtual/stub
  /// module registered under `request` has no real file to resolve to,
  /// so a plain resolution failure is not necessarily a dead end.
  pub(crate) fn resolve_request(
    &self,
    from: &Path,
    request: &str,
    options: &ResolveOptions<'_>,
  ) -> Result<PathBuf, RuntimeError> {
    match self.resolver.resolve_module(from, request, options) {
      Ok(path) => Ok(path),
      Err(ResolverError::NotFound { request, from }) => {
        if let Some(stub) = self.resolver.resolve_stub_module_name(&from, &request) {
          return Ok(stub);
        }
        let suggestions = self.sibling_extension_suggestions(&from, &request);
        Err(RuntimeError::ModuleNotFound {
          request,
          from,
          suggestions,
        })
      }
      Err(other) => Err(RuntimeError::Resolver(other)),
    }
  }

  /// spec.md §7: a failed resolution is "enriched with sibling-extension
  /// suggestions" before being rethrown. Only meaningful for relative
  /// requests (`./foo`, `../foo`) — swaps the request's extension for
  /// each of the runtime's configured extensions and keeps whichever
  /// candidates actually exist as a sibling file, so a `.ts`-less
  /// resolver configuration still points the user at `./foo.js` when
  /// that's what's really on disk.
  fn sibling_extension_suggestions(&self, from: &Path, request: &str) -> Vec<String> {
    if !(request.starts_with("./") || request.starts_with("../")) {
      return Vec::new();
    }
    let dir = match from.parent() {
      Some(dir) => dir,
      None => return Vec::new(),
    };
    let request_path = Path::new(request);
    let stem = request_path.with_extension("");
    let stem_str = stem.to_string_lossy().into_owned();
    self
      .config
      .extensions
      .iter()
      .filter_map(|ext| {
        let candidate = format!("{stem_str}.{ext}");
        if candidate == request {
          return None;
        }
        self
          .resolver
          .resolve_module_from_dir_if_exists(dir, &candidate)
          .map(|_| candidate)
      })
      .collect()
  }

  /// Loads `path` as a real module, reusing whichever layer it is
  /// already cached in or inserting a fresh, pre-execution `Module`
  /// before running its body (spec.md §3's cycle-safety invariant:
  /// insertion precedes execution).
  pub(crate) fn load_real_module(
    &self,
    path: &Path,
    is_internal: bool,
  ) -> Result<Rc<RefCell<GlobalValue>>, RuntimeError> {
    let layer = self.state.borrow().registries.select_layer(path, is_internal);
    let existing = self.state.borrow().registries.lookup(layer, path);

    let module = match existing {
      Some(module) => module,
      None => {
        let parent_path = self.state.borrow().currently_executing_path.clone();
        let fresh = Rc::new(RefCell::new(Module::new(
          path.to_path_buf(),
          parent_path,
          layer,
          RequireKind::Real,
        )));
        self
          .state
          .borrow_mut()
          .registries
          .insert(layer, path.to_path_buf(), fresh.clone());
        executor::execute_module(self, fresh.clone(), layer, is_internal)?;
        fresh
      }
    };

    self.record_child(path);
    Ok(module.borrow().exports.clone())
  }

  fn record_child(&self, path: &Path) {
    let current_path = self.state.borrow().currently_executing_path.clone();
    let Some(current_path) = current_path else {
      return;
    };
    if current_path == path {
      return;
    }
    if let Some(current_module) = self.state.borrow().registries.lookup_any(&current_path) {
      current_module.borrow_mut().children.push(path.to_path_buf());
    }
  }

  /// spec.md §4.3 "Resolution without mocking". Distinct from the mock
  /// policy engine (§4.3's nine-rule `shouldMock`): this is the
  /// "long-standing" special path that substitutes a manual mock file
  /// even for a request the policy engine decided *not* to mock,
  /// provided (a) a manual mock actually exists for the target, (b)
  /// the currently-executing module is not itself the manual mock
  /// being evaluated (otherwise a mock file's own `require` of its
  /// real counterpart would recurse into itself), and (c) the user has
  /// not explicitly `unmock`ed the request. See DESIGN.md for how the
  /// precedence ambiguity the spec calls out (§9 Open Questions) is
  /// resolved here: this check runs first, and `requireActual` bypasses
  /// it entirely by going straight to [`Runtime::load_real_module`].
  pub fn require_module(
    &self,
    from: &Path,
    request: &str,
  ) -> Result<Rc<RefCell<GlobalValue>>, RuntimeError> {
    if request.is_empty() {
      return Err(RuntimeError::EmptyResolveRequest);
    }
    if let Some(mock_path) = self.manual_mock_substitute(from, request) {
      return self.load_manual_mock(&mock_path);
    }
    self.require_actual(from, request)
  }

  fn manual_mock_substitute(&self, from: &Path, request: &str) -> Option<PathBuf> {
    let mock_path = self.resolver.get_mock_module(from, request)?;
    let id = self.module_id_for(from, request);
    let state = self.state.borrow();
    if state.currently_executing_is_manual_mock {
      return None;
    }
    if state.policy.explicit_should_mock.get(&id) == Some(&false) {
      return None;
    }
    Some(mock_path)
  }

  /// Loads framework-owned files (setup files, the runtime's own
  /// helpers) into the `internal` layer, which is never subject to
  /// mocking and survives `resetModules`.
  pub fn require_internal_module(
    &self,
    from: &Path,
    request: &str,
  ) -> Result<Rc<RefCell<GlobalValue>>, RuntimeError> {
    if request.is_empty() {
      return Err(RuntimeError::EmptyResolveRequest);
    }
    let path = self.resolve_request(from, request, &ResolveOptions::default())?;
    self.load_real_module(&path, true)
  }

  /// Always loads the real module, bypassing the mock policy engine
  /// entirely, regardless of any `jest.mock`/automock configuration —
  /// and, unlike [`Runtime::require_module`], bypassing the manual-mock
  /// special path above too: "actual" means actual.
  pub fn require_actual(
    &self,
    from: &Path,
    request: &str,
  ) -> Result<Rc<RefCell<GlobalValue>>, RuntimeError> {
    if request.is_empty() {
      return Err(RuntimeError::EmptyResolveRequest);
    }
    let path = self.resolve_request(from, request, &ResolveOptions::default())?;
    self.load_real_module(&path, false)
  }

  pub fn require_mock(
    &self,
    from: &Path,
    request: &str,
  ) -> Result<Rc<RefCell<GlobalValue>>, RuntimeError> {
    if request.is_empty() {
      return Err(RuntimeError::EmptyResolveRequest);
    }
    let id = self.module_id_for(from, request);
    self.require_mock_inner(from, request, &id)
  }

  fn require_mock_inner(
    &self,
    from: &Path,
    request: &str,
    id: &ModuleId,
  ) -> Result<Rc<RefCell<GlobalValue>>, RuntimeError> {
    if let Some(cached) = self.state.borrow().mock_registries.get(id) {
      return Ok(cached);
    }

    // A `jest.mock(path, factory)`-style registration wins over both a
    // manual `__mocks__` file and auto-mock synthesis.
    let factory = self.state.borrow().policy.mock_factories.get(id).cloned();
    if let Some(factory) = factory {
      let value = factory().cell();
      self
        .state
        .borrow_mut()
        .mock_registries
        .insert(id.clone(), value.clone());
      return Ok(value);
    }

    // A manual mock file under a sibling `__mocks__` directory.
    if let Some(mock_path) = self.resolver.get_mock_module(from, request) {
      let value = self.load_manual_mock(&mock_path)?;
      self
        .state
        .borrow_mut()
        .mock_registries
        .insert(id.clone(), value.clone());
      return Ok(value);
    }

    // Otherwise synthesize an auto-mock from the real module's shape.
    let real_path = self
      .resolver
      .get_module_path(from, request)
      .map_err(RuntimeError::Resolver)?;
    let cached = self.state.borrow().policy.mock_meta_data_cache.get(&real_path);
    let metadata = match cached {
      Some(metadata) => metadata,
      None => {
        // spec.md §4.3: "Metadata acquisition runs the real module in
        // temporarily isolated registries so that side-effects from its
        // top-level code do not leak into the running test's
        // registry" — backs the "auto-mock purity" invariant (spec.md
        // §8): neither `request` nor any of its transitive dependencies
        // may end up installed in the outer main registry as a result
        // of generating its auto-mock.
        let computed = self.with_scratch_registries(|| {
          let real_exports = self.require_actual(from, request)?;
          let mocker = self.sandbox.module_mocker();
          let captured = real_exports.borrow();
          Ok(
            mocker
              .get_metadata(&captured)
              .unwrap_or_else(|| crate::mock::automock::metadata_from_value(&captured)),
          )
        })?;
        self
          .state
          .borrow_mut()
          .policy
          .mock_meta_data_cache
          .insert(real_path.clone(), computed.clone());
        computed
      }
    };
    if metadata.is_empty() {
      return Err(RuntimeError::AutoMockEmpty { path: real_path });
    }
    let mocker = self.sandbox.module_mocker();
    let value = crate::mock::automock::regenerate(&metadata, mocker).cell();
    self
      .state
      .borrow_mut()
      .mock_registries
      .insert(id.clone(), value.clone());
    Ok(value)
  }

  /// Swaps the main/isolated module and mock registries out for empty
  /// ones for the duration of `f`, then restores whatever was there
  /// before — including an isolation scope the caller may already be
  /// inside. Unlike [`Runtime::isolate_modules`] (the user-visible
  /// `jest.isolateModules`), this is an internal mechanism with no
  /// nesting restriction: it exists solely so auto-mock metadata
  /// synthesis can execute a module's top-level body without any of
  /// its side effects — or the module itself — reaching the registries
  /// the running test observes.
  pub(crate) fn with_scratch_registries<T>(
    &self,
    f: impl FnOnce() -> Result<T, RuntimeError>,
  ) -> Result<T, RuntimeError> {
    let (saved_registries, saved_mocks) = {
      let mut state = self.state.borrow_mut();
      (
        std::mem::take(&mut state.registries),
        std::mem::take(&mut state.mock_registries),
      )
    };
    let result = f();
    let mut state = self.state.borrow_mut();
    state.registries = saved_registries;
    state.mock_registries = saved_mocks;
    result
  }

  fn load_manual_mock(&self, mock_path: &Path) -> Result<Rc<RefCell<GlobalValue>>, RuntimeError> {
    let layer = self.state.borrow().registries.select_layer(mock_path, false);
    let existing = self.state.borrow().registries.lookup(layer, mock_path);
    let module = match existing {
      Some(module) => module,
      None => {
        let parent_path = self.state.borrow().currently_executing_path.clone();
        let fresh = Rc::new(RefCell::new(Module::new(
          mock_path.to_path_buf(),
          parent_path,
          layer,
          RequireKind::ManualMock,
        )));
        self
          .state
          .borrow_mut()
          .registries
          .insert(layer, mock_path.to_path_buf(), fresh.clone());
        executor::execute_module(self, fresh.clone(), layer, false)?;
        fresh
      }
    };
    Ok(module.borrow().exports.clone())
  }

  /// spec.md §4.3 "Resolution inside mocking": the general-purpose
  /// `require()` a module body actually calls — consults the policy
  /// engine and dispatches to either the real loader or the mock path.
  pub fn require_module_or_mock(
    &self,
    from: &Path,
    request: &str,
  ) -> Result<Rc<RefCell<GlobalValue>>, RuntimeError> {
    if request.is_empty() {
      return Err(RuntimeError::EmptyResolveRequest);
    }
    let id = self.module_id_for(from, request);
    let unmock_regex = self.config.unmock_regex();
    let should_mock = {
      let mut state = self.state.borrow_mut();
      state
        .policy
        .should_mock(from, request, &id, self.resolver.as_ref(), unmock_regex.as_deref())
    };
    if should_mock {
      self.require_mock_inner(from, request, &id)
    } else {
      self.require_module(from, request)
    }
  }

  /// Runs `body` with the module/mock registries shadowed by a fresh
  /// isolation scope, restored once `body` returns. Rejects nesting
  /// (spec.md §4.6): jest only ever supports one isolation scope at a
  /// time.
  pub fn isolate_modules(&self, body: impl FnOnce(&Runtime)) -> Result<(), RuntimeError> {
    if self.state.borrow().registries.has_isolation() {
      return Err(RuntimeError::NestedIsolation);
    }
    let _guard = IsolationGuard::enter(self);
    body(self);
    Ok(())
  }

  /// Full reset (spec.md §3/§8): registries and mock-value caches are
  /// dropped, but explicit/virtual/factory mock *policy* survives.
  pub fn reset_modules(&self) {
    let mut state = self.state.borrow_mut();
    state.registries.reset();
    state.mock_registries.reset();
    state.policy.reset_memoization();
  }

  pub fn set_mock(&self, from: &Path, request: &str, value: Rc<RefCell<GlobalValue>>) {
    let id = self.module_id_for(from, request);
    self.state.borrow_mut().mock_registries.insert(id, value);
  }

  /// `jest.mock(request, factory?, { virtual? })`. `virtual` registers
  /// the same mock-path candidate rule 1 of `should_mock` consults
  /// (spec.md §4.3/§4.6), so a request with no file-system backing at
  /// all can still be mocked.
  pub fn mock(&self, from: &Path, request: &str, factory: Option<MockFactory>, virtual_mock: bool) {
    let id = self.module_id_for(from, request);
    let mut state = self.state.borrow_mut();
    state.policy.explicit_should_mock.insert(id.clone(), true);
    if let Some(factory) = factory {
      state.policy.mock_factories.insert(id, factory);
    }
    if virtual_mock {
      let candidate = self
        .resolver
        .get_module(request)
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| request.to_string());
      state.policy.virtual_mocks.insert(candidate);
    }
  }

  pub fn unmock(&self, from: &Path, request: &str) {
    let id = self.module_id_for(from, request);
    self.state.borrow_mut().policy.explicit_should_mock.insert(id, false);
  }

  pub fn deep_unmock(&self, from: &Path, request: &str) {
    let id = self.module_id_for(from, request);
    let mut state = self.state.borrow_mut();
    state.policy.explicit_should_mock.insert(id.clone(), false);
    state.policy.transitive_should_mock.insert(id, false);
  }

  pub fn clear_all_mocks(&self) {
    self.sandbox.module_mocker().clear_all_mocks();
  }

  pub fn reset_all_mocks(&self) {
    self.sandbox.module_mocker().reset_all_mocks();
  }

  pub fn restore_all_mocks(&self) {
    self.sandbox.module_mocker().restore_all_mocks();
  }

  /// Cycle-tolerant snapshot of the sandbox's coverage global, if any
  /// (spec.md Testable Properties: coverage-info copying must tolerate
  /// cycles in the recorded structure).
  pub fn get_all_coverage_info_copy(&self) -> Option<GlobalValue> {
    self.sandbox.get_global("__coverage__").map(|v| v.deep_copy())
  }

  pub fn get_source_maps(&self) -> HashMap<PathBuf, PathBuf> {
    let state = self.state.borrow();
    let loaded: HashSet<PathBuf> = state.registries.all_loaded_paths();
    state.source_maps.get_filtered_for_files(&loaded)
  }

  pub fn get_source_map_info(&self, path: &Path) -> Option<PathBuf> {
    self.state.borrow().source_maps.get(path).cloned()
  }

  pub(crate) fn set_test_timeout(&self, ms: u64) {
    self.state.borrow_mut().test_timeout_ms = ms;
  }

  pub(crate) fn set_retry_times(&self, n: u32) {
    self.state.borrow_mut().retry_times = n;
  }

  pub(crate) fn register_matcher(&self, name: String, value: GlobalValue) {
    self.state.borrow_mut().custom_matchers.insert(name, value);
  }

  /// spec.md §7's last disposition row: the embedding `Sandbox` is
  /// expected to call this back when user code invokes `process.exit`
  /// from within an executing module, so the call is formatted to
  /// stderr — arguments plus a runtime-frame-filtered stack — before
  /// the real exit is allowed to proceed. A configured
  /// `RuntimeConfig::on_process_exit` callback takes precedence if one
  /// was supplied; otherwise the default formatting is written
  /// directly to stderr.
  pub fn handle_process_exit(&self, args: &[String], stack: &str) {
    let filtered = teardown::strip_runtime_frames(stack);
    match &self.config.on_process_exit {
      Some(callback) => callback(args, &filtered),
      None => {
        eprintln!("process.exit({}) called from:\n{}", args.join(", "), filtered);
      }
    }
  }
}

struct IsolationGuard {
  runtime: Runtime,
}

impl IsolationGuard {
  fn enter(runtime: &Runtime) -> Self {
    let mut state = runtime.state.borrow_mut();
    state.registries.begin_isolation();
    state.mock_registries.begin_isolation();
    drop(state);
    Self {
      runtime: runtime.clone(),
    }
  }
}

impl Drop for IsolationGuard {
  fn drop(&mut self) {
    let mut state = self.runtime.state.borrow_mut();
    state.registries.end_isolation();
    state.mock_registries.end_isolation();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::InMemoryResolver;
  use crate::testing::InMemorySandbox;
  use crate::transform::TransformCache;
  use crate::transform::TransformError;
  use crate::transform::TransformOptions;
  use crate::transform::TransformOutput;

  /// A tiny line-oriented DSL in place of a real transform pipeline:
  /// `require:<request>` drives a nested require, `export:<k>=<v>`
  /// writes a string field onto this module's exports, `globalset:<k>=<v>`
  /// and `exportglobal:<k>=<global-k>` read/write the sandbox global
  /// handed to the module body as its 6th synthetic argument. Good
  /// enough to exercise the executor/require/mock plumbing end to end
  /// without a real script engine.
  struct ScriptedTransform;

  impl crate::transform::Transform for ScriptedTransform {
    fn transform(
      &self,
      _path: &Path,
      source: &str,
      options: &TransformOptions,
    ) -> Result<TransformOutput, TransformError> {
      let body = source.to_string();
      let wrapper = Rc::new(move |args: &mut crate::executor::ExecArgs<'_>| {
        for line in body.lines() {
          let line = line.trim();
          if line.is_empty() {
            continue;
          }
          if let Some(rest) = line.strip_prefix("require:") {
            args.require.call(rest).map_err(|e| {
              crate::sandbox::SandboxError::ExecutionFailed(e.to_string())
            })?;
          } else if let Some(rest) = line.strip_prefix("export:") {
            if let Some((key, value)) = rest.split_once('=') {
              if let GlobalValue::Object(fields) = &mut *args.exports.borrow_mut() {
                fields.insert(key.to_string(), GlobalValue::String(value.to_string()).cell());
              }
            }
          } else if let Some(rest) = line.strip_prefix("globalset:") {
            if let Some((key, value)) = rest.split_once('=') {
              args.global.set_global(key, GlobalValue::String(value.to_string()));
            }
          } else if let Some(rest) = line.strip_prefix("exportglobal:") {
            if let Some((key, global_key)) = rest.split_once('=') {
              if let Some(value) = args.global.get_global(global_key) {
                if let GlobalValue::Object(fields) = &mut *args.exports.borrow_mut() {
                  fields.insert(key.to_string(), value.cell());
                }
              }
            }
          }
        }
        Ok(())
      });
      Ok(TransformOutput {
        script: crate::transform::CompiledScript::new(wrapper, None, options.collect_coverage),
      })
    }
  }

  fn export_str(module: &Rc<RefCell<GlobalValue>>, key: &str) -> Option<String> {
    match &*module.borrow() {
      GlobalValue::Object(fields) => fields.get(key).map(|v| match &*v.borrow() {
        GlobalValue::String(s) => s.clone(),
        _ => panic!("expected string export"),
      }),
      _ => None,
    }
  }

  fn build_runtime(resolver: InMemoryResolver, automock: bool) -> (Runtime, tempfile::TempDir) {
    let cache_dir = tempfile::tempdir().unwrap();
    let transform_cache = TransformCache::new(ScriptedTransform, cache_dir.path().to_path_buf());
    let config = RuntimeConfig {
      automock,
      ..Default::default()
    };
    let runtime = Runtime::new(
      config,
      Rc::new(resolver),
      Rc::new(InMemorySandbox::default()),
      Rc::new(transform_cache),
    );
    (runtime, cache_dir)
  }

  #[test]
  fn simple_require_sees_dependency_exports() {
    let mut resolver = InMemoryResolver::default();
    resolver.add_file("/proj/a.js", "require:./b.js\nexport:seen=a");
    resolver.add_file("/proj/b.js", "export:value=b");
    let (runtime, _dir) = build_runtime(resolver, false);

    let exports = runtime
      .require_module(Path::new("/proj/entry.js"), "/proj/a.js")
      .unwrap();
    assert_eq!(export_str(&exports, "seen").as_deref(), Some("a"));

    let b = runtime
      .require_module(Path::new("/proj/a.js"), "./b.js")
      .unwrap();
    assert_eq!(export_str(&b, "value").as_deref(), Some("b"));
  }

  #[test]
  fn cyclic_require_does_not_hang_and_sees_partial_exports() {
    let mut resolver = InMemoryResolver::default();
    resolver.add_file("/proj/a.js", "require:./b.js\nexport:name=a");
    resolver.add_file("/proj/b.js", "require:./a.js\nexport:name=b");
    let (runtime, _dir) = build_runtime(resolver, false);

    let a = runtime
      .require_module(Path::new("/proj/entry.js"), "/proj/a.js")
      .unwrap();
    assert_eq!(export_str(&a, "name").as_deref(), Some("a"));

    let b = runtime
      .require_module(Path::new("/proj/entry.js"), "/proj/b.js")
      .unwrap();
    assert_eq!(export_str(&b, "name").as_deref(), Some("b"));
  }

  #[test]
  fn automock_synthesizes_empty_shell_for_plain_object_export() {
    let mut resolver = InMemoryResolver::default();
    resolver.add_file("/proj/a.js", "export:value=real");
    let (runtime, _dir) = build_runtime(resolver, true);

    let result = runtime.require_module_or_mock(Path::new("/proj/entry.js"), "/proj/a.js");
    // The scripted transform always yields an `Object` export with one
    // string field; the in-memory mocker's metadata walk turns string
    // fields into `Primitive`s, which regenerate as `GlobalValue::Null`
    // rather than the real string — demonstrating automock substitution.
    let exports = result.unwrap();
    match &*exports.borrow() {
      GlobalValue::Object(fields) => match &*fields.get("value").unwrap().borrow() {
        GlobalValue::Null => {}
        other => panic!("expected automocked null placeholder, got {other:?}"),
      },
      other => panic!("expected object export, got {other:?}"),
    }
  }

  #[test]
  fn automock_never_leaves_the_real_module_installed_in_main() {
    let mut resolver = InMemoryResolver::default();
    resolver.add_file("/proj/a.js", "require:./b.js\nexport:value=real");
    resolver.add_file("/proj/b.js", "export:value=dep");
    let (runtime, _dir) = build_runtime(resolver, true);

    runtime
      .require_module_or_mock(Path::new("/proj/entry.js"), "/proj/a.js")
      .unwrap();

    assert!(!runtime.state.borrow().registries.main.contains(Path::new("/proj/a.js")));
    assert!(!runtime.state.borrow().registries.main.contains(Path::new("/proj/b.js")));
  }

  #[test]
  fn manual_mock_substitutes_for_plain_require_even_when_not_auto_mocking() {
    let mut resolver = InMemoryResolver::default();
    resolver.add_file("/proj/a.js", "export:value=real");
    resolver.add_file("/proj/__mocks__/a.js", "export:value=mocked");
    let (runtime, _dir) = build_runtime(resolver, false);

    let exports = runtime
      .require_module(Path::new("/proj/entry.js"), "/proj/a.js")
      .unwrap();
    assert_eq!(export_str(&exports, "value").as_deref(), Some("mocked"));

    // requireActual bypasses the manual-mock special path entirely.
    let actual = runtime
      .require_actual(Path::new("/proj/entry.js"), "/proj/a.js")
      .unwrap();
    assert_eq!(export_str(&actual, "value").as_deref(), Some("real"));
  }

  #[test]
  fn explicit_unmock_suppresses_the_manual_mock_special_path() {
    let mut resolver = InMemoryResolver::default();
    resolver.add_file("/proj/a.js", "export:value=real");
    resolver.add_file("/proj/__mocks__/a.js", "export:value=mocked");
    let (runtime, _dir) = build_runtime(resolver, false);
    runtime.unmock(Path::new("/proj/entry.js"), "/proj/a.js");

    let exports = runtime
      .require_module(Path::new("/proj/entry.js"), "/proj/a.js")
      .unwrap();
    assert_eq!(export_str(&exports, "value").as_deref(), Some("real"));
  }

  #[test]
  fn handle_process_exit_prefers_the_configured_callback() {
    let resolver = InMemoryResolver::default();
    let cache_dir = tempfile::tempdir().unwrap();
    let transform_cache = TransformCache::new(ScriptedTransform, cache_dir.path().to_path_buf());
    let captured: Rc<RefCell<Option<(Vec<String>, String)>>> = Rc::new(RefCell::new(None));
    let captured_clone = captured.clone();
    let config = RuntimeConfig {
      on_process_exit: Some(Rc::new(move |args: &[String], stack: &str| {
        *captured_clone.borrow_mut() = Some((args.to_vec(), stack.to_string()));
      })),
      ..Default::default()
    };
    let runtime = Runtime::new(
      config,
      Rc::new(resolver),
      Rc::new(InMemorySandbox::default()),
      Rc::new(transform_cache),
    );

    runtime.handle_process_exit(
      &["1".to_string()],
      "at userCode (app.js:1:1)\nat module_runtime::executor::execute_module (executor.rs:10)",
    );

    let (args, stack) = captured.borrow().clone().unwrap();
    assert_eq!(args, vec!["1".to_string()]);
    assert!(stack.contains("userCode"));
    assert!(!stack.contains("module_runtime::"));
  }

  #[test]
  fn module_body_can_read_and_write_the_sandbox_global() {
    let mut resolver = InMemoryResolver::default();
    resolver.add_file("/proj/a.js", "globalset:shared=from-a");
    resolver.add_file("/proj/b.js", "exportglobal:seen=shared");
    let (runtime, _dir) = build_runtime(resolver, false);

    runtime
      .require_module(Path::new("/proj/entry.js"), "/proj/a.js")
      .unwrap();
    let b = runtime
      .require_module(Path::new("/proj/entry.js"), "/proj/b.js")
      .unwrap();
    assert_eq!(export_str(&b, "seen").as_deref(), Some("from-a"));
  }

  #[test]
  fn virtual_mock_resolves_with_no_file_system_backing() {
    let resolver = InMemoryResolver::default();
    let (runtime, _dir) = build_runtime(resolver, false);
    let from = Path::new("/proj/test.js");

    let factory: MockFactory = Rc::new(|| GlobalValue::String("virtual-value".to_string()));
    runtime.mock(from, "virtual-thing", Some(factory), true);

    let exports = runtime.require_module_or_mock(from, "virtual-thing").unwrap();
    match &*exports.borrow() {
      GlobalValue::String(s) => assert_eq!(s, "virtual-value"),
      other => panic!("expected virtual mock's factory value, got {other:?}"),
    }
  }

  #[test]
  fn resolve_falls_back_to_a_registered_stub_module_when_resolution_fails() {
    let mut resolver = InMemoryResolver::default();
    resolver.add_stub("./virtual-thing", "/proj/__virtual__/virtual-thing");
    let (runtime, _dir) = build_runtime(resolver, false);

    let resolved = runtime
      .resolve_request(
        Path::new("/proj/entry.js"),
        "./virtual-thing",
        &crate::resolver::ResolveOptions::default(),
      )
      .unwrap();
    assert_eq!(resolved, PathBuf::from("/proj/__virtual__/virtual-thing"));
  }

  #[test]
  fn explicit_unmock_overrides_automock_default() {
    let mut resolver = InMemoryResolver::default();
    resolver.add_file("/proj/a.js", "export:value=real");
    let (runtime, _dir) = build_runtime(resolver, true);
    runtime.unmock(Path::new("/proj/entry.js"), "/proj/a.js");

    let exports = runtime
      .require_module_or_mock(Path::new("/proj/entry.js"), "/proj/a.js")
      .unwrap();
    assert_eq!(export_str(&exports, "value").as_deref(), Some("real"));
  }

  #[test]
  fn isolate_modules_scopes_a_fresh_instance_without_leaking_to_main() {
    let mut resolver = InMemoryResolver::default();
    resolver.add_file("/proj/a.js", "export:token=shared");
    let (runtime, _dir) = build_runtime(resolver, false);

    let mut isolated_ptr = None;
    runtime
      .isolate_modules(|scoped| {
        let isolated_instance = scoped
          .require_module(Path::new("/proj/entry.js"), "/proj/a.js")
          .unwrap();
        isolated_ptr = Some(Rc::as_ptr(&isolated_instance));
      })
      .unwrap();
    assert!(!runtime.state.borrow().registries.has_isolation());

    // The isolation scope never touched `main`, so a fresh require
    // afterwards loads (and re-executes) a distinct instance.
    let main_instance = runtime
      .require_module(Path::new("/proj/entry.js"), "/proj/a.js")
      .unwrap();
    assert_ne!(isolated_ptr.unwrap(), Rc::as_ptr(&main_instance));
  }

  #[test]
  fn nested_isolation_is_rejected() {
    let resolver = InMemoryResolver::default();
    let (runtime, _dir) = build_runtime(resolver, false);
    let outer = runtime.clone();
    let result = runtime.isolate_modules(|_| {
      let err = outer.isolate_modules(|_| {}).unwrap_err();
      assert!(matches!(err, RuntimeError::NestedIsolation));
    });
    assert!(result.is_ok());
  }

  #[test]
  fn torn_down_sandbox_never_surfaces_as_an_error() {
    let mut resolver = InMemoryResolver::default();
    resolver.add_file("/proj/a.js", "export:value=x");
    let cache_dir = tempfile::tempdir().unwrap();
    let transform_cache = TransformCache::new(ScriptedTransform, cache_dir.path().to_path_buf());
    let sandbox = Rc::new(InMemorySandbox::default());
    sandbox.dispose();
    let runtime = Runtime::new(
      RuntimeConfig::default(),
      Rc::new(resolver),
      sandbox,
      Rc::new(transform_cache),
    );

    let result = runtime.require_module(Path::new("/proj/entry.js"), "/proj/a.js");
    assert!(result.is_ok());
    assert_eq!(runtime.exit_code(), 1);
  }
}
