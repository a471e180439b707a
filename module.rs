// Copyright 2018-2026 the module_runtime authors. MIT license.

//! The module object (spec.md §3). Field shapes mirror what user code
//! expects to find on Node/CommonJS-style `module` objects, but
//! `parent` is resolved lazily through a registry lookup rather than
//! stored as a direct reference — storing it directly would extend a
//! module's lifetime across a `resetModules`/isolation swap and would
//! go stale the moment the registry it pointed into was replaced.

use std::cell::RefCell;
use std::path::Path;
use std::path::PathBuf;
use std::rc::Rc;

use crate::registry::Layer;
use crate::registry::RegistrySet;
use crate::sandbox::GlobalValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequireKind {
  Real,
  ManualMock,
}

pub struct Module {
  pub filename: PathBuf,
  pub exports: Rc<RefCell<GlobalValue>>,
  pub children: Vec<PathBuf>,
  pub loaded: bool,
  /// The path of the module that required this one, re-resolved
  /// through the registry at read time (see [`Module::parent`]).
  parent_path: Option<PathBuf>,
  /// Which layer the *parent* lookup should prefer. Isolation scopes
  /// swap registries underfoot; the layer the parent was loaded
  /// through at require-time is what a correct `parent` read must
  /// consult, not whichever layer happens to be active now.
  parent_layer: Layer,
  pub paths: Vec<PathBuf>,
  pub kind: RequireKind,
}

impl Module {
  pub fn new(
    filename: PathBuf,
    parent_path: Option<PathBuf>,
    parent_layer: Layer,
    kind: RequireKind,
  ) -> Self {
    let paths = module_directory_chain(&filename);
    Self {
      filename,
      exports: GlobalValue::Object(Default::default()).cell(),
      children: Vec::new(),
      loaded: false,
      parent_path,
      parent_layer,
      paths,
      kind,
    }
  }

  /// Looks up the current module object for `parent_path` in
  /// `registries`. Returns `None` if there was no parent (this is the
  /// entry module) or if the parent is no longer present in its layer
  /// (e.g. a reset dropped it) — this is deliberately "weak": a stale
  /// parent path reads as absent rather than panicking.
  pub fn parent(
    &self,
    registries: &RegistrySet,
  ) -> Option<Rc<RefCell<Module>>> {
    let parent_path = self.parent_path.as_ref()?;
    registries.lookup(self.parent_layer, parent_path)
  }

  /// Walks the parent chain to the topmost distinct ancestor, backing
  /// `require.main` (C7).
  pub fn main(
    self_path: &Path,
    registries: &RegistrySet,
  ) -> Option<Rc<RefCell<Module>>> {
    let mut current = registries.lookup_any(self_path)?;
    loop {
      let next = current.borrow().parent(registries);
      match next {
        Some(next) if !Rc::ptr_eq(&next, &current) => current = next,
        _ => return Some(current),
      }
    }
  }
}

/// Directory-ancestor search order the resolver's module-directory
/// walk uses. A real resolver recomputes this from `node_modules`
/// semantics; this pure-path helper only establishes `paths[0]`, the
/// module's own directory, which `require.resolve.paths` relies on
/// for relative requests regardless of what the resolver does beyond
/// that.
fn module_directory_chain(filename: &Path) -> Vec<PathBuf> {
  match filename.parent() {
    Some(dir) => vec![dir.to_path_buf()],
    None => Vec::new(),
  }
}
