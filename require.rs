// Copyright 2018-2026 the module_runtime authors. MIT license.

//! The local require factory (component C7, spec.md §4.5): the
//! per-module `require` function bound to a fixed `from` path. Every
//! executed module gets its own `LocalRequire`, built fresh by the
//! executor for each call (spec.md §4.4 step 3) rather than shared,
//! since its behavior (mocking, internal-ness) is bound to the module
//! that owns it.

use std::cell::RefCell;
use std::path::Path;
use std::path::PathBuf;
use std::rc::Rc;

use crate::error::RuntimeError;
use crate::module::Module;
use crate::resolver::ResolveOptions;
use crate::runtime::Runtime;
use crate::sandbox::GlobalValue;

#[derive(Clone)]
pub struct LocalRequire {
  runtime: Runtime,
  from: PathBuf,
  is_internal: bool,
}

impl LocalRequire {
  pub(crate) fn new(runtime: Runtime, from: PathBuf, is_internal: bool) -> Self {
    Self {
      runtime,
      from,
      is_internal,
    }
  }

  /// `require(request)`: the call a module body actually makes.
  /// Internal modules never consult the mock policy engine — they are
  /// framework plumbing, not code under test.
  pub fn call(&self, request: &str) -> Result<Rc<RefCell<GlobalValue>>, RuntimeError> {
    if self.is_internal {
      self.runtime.require_internal_module(&self.from, request)
    } else {
      self.runtime.require_module_or_mock(&self.from, request)
    }
  }

  pub fn require_actual(&self, request: &str) -> Result<Rc<RefCell<GlobalValue>>, RuntimeError> {
    self.runtime.require_actual(&self.from, request)
  }

  pub fn require_mock(&self, request: &str) -> Result<Rc<RefCell<GlobalValue>>, RuntimeError> {
    self.runtime.require_mock(&self.from, request)
  }

  /// `require.resolve(request, options)`.
  pub fn resolve(
    &self,
    request: &str,
    options: &ResolveOptions<'_>,
  ) -> Result<PathBuf, RuntimeError> {
    if request.is_empty() {
      return Err(RuntimeError::EmptyResolveRequest);
    }
    self.runtime.resolve_request(&self.from, request, options)
  }

  /// `require.resolve.paths(request)`. Resolved per the open question
  /// in spec.md §9 about relative requests combined with explicit
  /// `paths` (see DESIGN.md): an empty request has no search path at
  /// all; a relative request only ever searches its own directory,
  /// regardless of anything passed to `resolve`; a core module has no
  /// file-system search path; anything else defers to the resolver's
  /// own module-directory chain.
  pub fn resolve_paths(&self, request: &str) -> Option<Vec<PathBuf>> {
    if request.is_empty() {
      return None;
    }
    if self.runtime.resolver.is_core_module(request) {
      return None;
    }
    let dir = self
      .from
      .parent()
      .map(Path::to_path_buf)
      .unwrap_or_else(|| PathBuf::from("/"));
    if request.starts_with("./") || request.starts_with("../") || request == "." || request == ".." {
      return Some(vec![dir]);
    }
    Some(self.runtime.resolver.get_module_paths(&dir))
  }

  /// `require.main`: the topmost ancestor of the current module's
  /// require chain.
  pub fn main(&self) -> Option<Rc<RefCell<Module>>> {
    Module::main(&self.from, &self.runtime.state.borrow().registries)
  }

  /// `require.extensions`: the configured extension search list. A
  /// read-only snapshot — this crate has no dynamic loader-hook
  /// registration surface, unlike Node's mutable `require.extensions`.
  pub fn extensions(&self) -> Vec<String> {
    self.runtime.config().extensions.clone()
  }

  /// `require.cache`: a read-only snapshot of every path currently
  /// loaded across the main and internal layers, in the style of
  /// Node's live `require.cache` map. A fresh snapshot is returned on
  /// every call rather than a live handle, since this crate's registry
  /// isn't addressable as a single flat map from the outside.
  pub fn cache(&self) -> Vec<PathBuf> {
    self
      .runtime
      .state
      .borrow()
      .registries
      .all_loaded_paths()
      .into_iter()
      .collect()
  }
}
