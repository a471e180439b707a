// Copyright 2018-2026 the module_runtime authors. MIT license.

//! In-memory reference implementations of the `Resolver` and `Sandbox`
//! collaborator traits, used only by this crate's own test suite — no
//! production embedder is expected to use these; they exist the way
//! the teacher exercises `DiskCache`/`CodeCache` against an in-memory
//! or temp-directory backing store rather than a real remote cache
//! (`cli/cache/disk_cache.rs` tests, `CacheDB::in_memory`).

use std::cell::Cell;
use std::cell::RefCell;
use std::collections::HashMap;
use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;

use crate::executor::ExecArgs;
use crate::mock::automock::MockMetadata;
use crate::mock::registry::VirtualMockSet;
use crate::resolver::ModuleId;
use crate::resolver::ResolveOptions;
use crate::resolver::Resolver;
use crate::resolver::ResolverError;
use crate::sandbox::FakeTimers;
use crate::sandbox::GlobalValue;
use crate::sandbox::ModuleMocker;
use crate::sandbox::MockFunctionId;
use crate::sandbox::Sandbox;
use crate::sandbox::SandboxError;
use crate::transform::CompiledScript;

/// A flat, in-memory stand-in for a real filesystem resolver. Files
/// are addressed by an exact absolute-looking path string; relative
/// requests (`./x`, `../x`) are normalized against `from`'s directory,
/// bare requests consult the `stubs` table a test registers up front.
#[derive(Default)]
pub struct InMemoryResolver {
  files: HashSet<PathBuf>,
  core_modules: HashSet<String>,
  stubs: HashMap<String, PathBuf>,
  vendored_segment: Option<String>,
}

impl InMemoryResolver {
  pub fn add_file(&mut self, path: impl Into<PathBuf>, _contents: impl Into<String>) -> &mut Self {
    self.files.insert(path.into());
    self
  }

  pub fn add_core_module(&mut self, name: impl Into<String>) -> &mut Self {
    self.core_modules.insert(name.into());
    self
  }

  pub fn add_stub(&mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> &mut Self {
    self.stubs.insert(name.into(), path.into());
    self
  }

  fn vendored_segment_name(&self) -> String {
    self
      .vendored_segment
      .clone()
      .unwrap_or_else(|| "node_modules".to_string())
  }

  fn resolve_path(&self, from: &Path, request: &str) -> Option<PathBuf> {
    if request.is_empty() {
      return None;
    }
    if request.starts_with("./") || request.starts_with("../") || request == "." || request == ".." {
      let dir = from.parent().unwrap_or_else(|| Path::new("/"));
      let candidate = normalize(&dir.join(request));
      if self.files.contains(&candidate) {
        return Some(candidate);
      }
      return None;
    }
    // An absolute request is looked up directly, as a convenience for
    // tests that address files by their full registered path rather
    // than a request relative to some `from`.
    if request.starts_with('/') {
      let candidate = PathBuf::from(request);
      if self.files.contains(&candidate) {
        return Some(candidate);
      }
      return None;
    }
    if let Some(stub) = self.stubs.get(request) {
      return Some(stub.clone());
    }
    let vendored = self.vendored_segment_name();
    let candidate = PathBuf::from("/").join(&vendored).join(request).join("index.js");
    if self.files.contains(&candidate) {
      return Some(candidate);
    }
    None
  }
}

/// Collapses `.`/`..` components without touching the real filesystem
/// (this resolver has no filesystem backing at all).
fn normalize(path: &Path) -> PathBuf {
  let mut out = PathBuf::new();
  for component in path.components() {
    match component {
      std::path::Component::CurDir => {}
      std::path::Component::ParentDir => {
        out.pop();
      }
      other => out.push(other.as_os_str()),
    }
  }
  out
}

impl Resolver for InMemoryResolver {
  fn resolve_module(
    &self,
    from: &Path,
    request: &str,
    options: &ResolveOptions<'_>,
  ) -> Result<PathBuf, ResolverError> {
    if let Some(paths) = options.paths {
      for root in paths {
        let candidate = normalize(&root.join(request));
        if self.files.contains(&candidate) {
          return Ok(candidate);
        }
      }
    }
    self.resolve_path(from, request).ok_or_else(|| ResolverError::NotFound {
      request: request.to_string(),
      from: from.to_path_buf(),
    })
  }

  fn is_core_module(&self, request: &str) -> bool {
    self.core_modules.contains(request)
  }

  fn get_module(&self, request: &str) -> Option<PathBuf> {
    if let Some(stub) = self.stubs.get(request) {
      return Some(stub.clone());
    }
    let vendored = self.vendored_segment_name();
    let candidate = PathBuf::from("/").join(&vendored).join(request).join("index.js");
    if self.files.contains(&candidate) {
      Some(candidate)
    } else {
      None
    }
  }

  fn get_mock_module(&self, from: &Path, request: &str) -> Option<PathBuf> {
    let real = self.resolve_path(from, request)?;
    let dir = real.parent()?;
    let name = real.file_name()?;
    let mock_path = dir.join("__mocks__").join(name);
    if self.files.contains(&mock_path) {
      Some(mock_path)
    } else {
      None
    }
  }

  fn get_module_id(
    &self,
    virtual_mocks: &VirtualMockSet,
    from: &Path,
    name: Option<&str>,
  ) -> ModuleId {
    match name {
      None => ModuleId::new(from.to_string_lossy().into_owned()),
      Some(request) => {
        let candidate = self
          .resolve_path(from, request)
          .map(|p| p.to_string_lossy().into_owned())
          .unwrap_or_else(|| request.to_string());
        if virtual_mocks.contains(&candidate) || virtual_mocks.contains(request) {
          ModuleId::new(format!("virtual:{candidate}"))
        } else {
          ModuleId::new(candidate)
        }
      }
    }
  }

  fn get_module_path(&self, from: &Path, request: &str) -> Result<PathBuf, ResolverError> {
    self.resolve_path(from, request).ok_or_else(|| ResolverError::NotFound {
      request: request.to_string(),
      from: from.to_path_buf(),
    })
  }

  fn get_module_paths(&self, dir: &Path) -> Vec<PathBuf> {
    let mut chain = Vec::new();
    let mut current = Some(dir.to_path_buf());
    let vendored = self.vendored_segment_name();
    while let Some(dir) = current {
      chain.push(dir.join(&vendored));
      current = dir.parent().map(Path::to_path_buf);
    }
    chain
  }

  fn resolve_stub_module_name(&self, _from: &Path, name: &str) -> Option<PathBuf> {
    self.stubs.get(name).cloned()
  }

  fn resolve_module_from_dir_if_exists(&self, dir: &Path, name: &str) -> Option<PathBuf> {
    let candidate = normalize(&dir.join(name));
    if self.files.contains(&candidate) {
      Some(candidate)
    } else {
      None
    }
  }

  fn is_vendored(&self, path: &Path) -> bool {
    let segment = self.vendored_segment_name();
    path.components().any(|c| c.as_os_str() == segment.as_str())
  }
}

/// A trivial `ModuleMocker`: mock functions are opaque incrementing
/// ids, and automock metadata/generation pass straight through to the
/// crate's own structural helpers rather than modeling a real mocking
/// engine's call-tracking.
#[derive(Default)]
struct SimpleMocker {
  next_id: Cell<u64>,
  live: RefCell<HashSet<u64>>,
}

impl ModuleMocker for SimpleMocker {
  fn fn_mock(&self) -> MockFunctionId {
    let id = self.next_id.get();
    self.next_id.set(id + 1);
    self.live.borrow_mut().insert(id);
    MockFunctionId(id)
  }

  fn spy_on(&self, _object_key: &str, _method: &str) -> MockFunctionId {
    self.fn_mock()
  }

  fn is_mock_function(&self, id: MockFunctionId) -> bool {
    self.live.borrow().contains(&id.0)
  }

  fn clear_all_mocks(&self) {}

  fn reset_all_mocks(&self) {
    self.live.borrow_mut().clear();
  }

  fn restore_all_mocks(&self) {
    self.live.borrow_mut().clear();
  }

  fn get_metadata(&self, value: &GlobalValue) -> Option<MockMetadata> {
    Some(crate::mock::automock::metadata_from_value(value))
  }

  fn generate_from_metadata(&self, metadata: &MockMetadata) -> GlobalValue {
    match metadata {
      MockMetadata::Function => GlobalValue::Null,
      MockMetadata::Primitive => GlobalValue::Null,
      MockMetadata::Object(fields) => GlobalValue::Object(
        fields
          .iter()
          .map(|(k, v)| (k.clone(), self.generate_from_metadata(v).cell()))
          .collect(),
      ),
      MockMetadata::Array(items) => GlobalValue::Array(
        items
          .iter()
          .map(|v| self.generate_from_metadata(v).cell())
          .collect(),
      ),
    }
  }
}

#[derive(Default)]
struct SimpleTimers {
  pending: Cell<usize>,
}

impl FakeTimers for SimpleTimers {
  fn advance_by_time(&self, _ms: u64) {}
  fn run_all_timers(&self) {
    self.pending.set(0);
  }
  fn run_all_ticks(&self) {}
  fn run_all_immediates(&self) {}
  fn run_only_pending_timers(&self) {}
  fn clear_all_timers(&self) {
    self.pending.set(0);
  }
  fn timer_count(&self) -> usize {
    self.pending.get()
  }
}

/// An in-memory sandbox that runs a `CompiledScript`'s wrapper closure
/// directly against a plain global map, with no real engine isolate
/// underneath. `dispose()` simulates teardown for exercising the
/// Teardown Guard (C10) in tests.
pub struct InMemorySandbox {
  disposed: Cell<bool>,
  globals: RefCell<HashMap<String, GlobalValue>>,
  mocker: SimpleMocker,
  timers: SimpleTimers,
  fake_timers_installed: Cell<bool>,
}

impl Default for InMemorySandbox {
  fn default() -> Self {
    Self {
      disposed: Cell::new(false),
      globals: RefCell::new(HashMap::new()),
      mocker: SimpleMocker::default(),
      timers: SimpleTimers::default(),
      fake_timers_installed: Cell::new(false),
    }
  }
}

impl InMemorySandbox {
  pub fn dispose(&self) {
    self.disposed.set(true);
  }
}

impl Sandbox for InMemorySandbox {
  fn is_disposed(&self) -> bool {
    self.disposed.get()
  }

  fn run_script(
    &self,
    script: &CompiledScript,
    args: &mut ExecArgs<'_>,
  ) -> Option<Result<(), SandboxError>> {
    if self.disposed.get() {
      return None;
    }
    Some(script.invoke(args))
  }

  fn get_global(&self, name: &str) -> Option<GlobalValue> {
    self.globals.borrow().get(name).cloned()
  }

  fn set_global(&self, name: &str, value: GlobalValue) {
    self.globals.borrow_mut().insert(name.to_string(), value);
  }

  fn module_mocker(&self) -> &dyn ModuleMocker {
    &self.mocker
  }

  fn fake_timers(&self) -> Option<&dyn FakeTimers> {
    if self.fake_timers_installed.get() {
      Some(&self.timers)
    } else {
      None
    }
  }

  fn install_fake_timers(&self) {
    self.fake_timers_installed.set(true);
  }

  fn use_real_timers(&self) {
    self.fake_timers_installed.set(false);
  }

  fn setup(&mut self) -> Result<(), SandboxError> {
    self.disposed.set(false);
    Ok(())
  }

  fn teardown(&mut self) {
    self.disposed.set(true);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn relative_request_resolves_against_from_directory() {
    let mut resolver = InMemoryResolver::default();
    resolver.add_file("/proj/a.js", "");
    resolver.add_file("/proj/b.js", "");
    let resolved = resolver
      .resolve_module(Path::new("/proj/a.js"), "./b.js", &ResolveOptions::default())
      .unwrap();
    assert_eq!(resolved, PathBuf::from("/proj/b.js"));
  }

  #[test]
  fn missing_module_is_not_found() {
    let resolver = InMemoryResolver::default();
    let err = resolver
      .resolve_module(Path::new("/proj/a.js"), "./missing.js", &ResolveOptions::default())
      .unwrap_err();
    assert!(matches!(err, ResolverError::NotFound { .. }));
  }

  #[test]
  fn disposed_sandbox_run_script_returns_none() {
    let mut sandbox = InMemorySandbox::default();
    sandbox.dispose();
    assert!(sandbox.is_disposed());
  }
}
