// Copyright 2018-2026 the module_runtime authors. MIT license.

//! The module registry (component C4, spec.md §3/§4.2). Three layers
//! coexist: `main` (persistent, cleared by explicit reset), `internal`
//! (framework-owned, never mocked, never reset) and `isolated`
//! (present only inside an isolation scope; shadows `main` for
//! real-module requests while active).

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::rc::Rc;

use crate::module::Module;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
  Main,
  Internal,
  Isolated,
}

/// A single layer's path → module map. Keys are raw path strings
/// (`PathBuf`), so there is no analogue of JS's prototype-pollution
/// concern here — a plain `HashMap` already has no inherited
/// properties to collide with.
#[derive(Default)]
pub struct ModuleRegistry {
  modules: HashMap<PathBuf, Rc<RefCell<Module>>>,
}

impl ModuleRegistry {
  pub fn lookup(&self, path: &Path) -> Option<Rc<RefCell<Module>>> {
    self.modules.get(path).cloned()
  }

  /// Inserts `module`. Per the invariant in spec.md §3, this must
  /// happen *before* the module's body executes, so that a cyclic
  /// require reaching back into `path` observes the (possibly
  /// partial) exports object rather than recursing.
  pub fn insert(&mut self, path: PathBuf, module: Rc<RefCell<Module>>) {
    self.modules.insert(path, module);
  }

  pub fn contains(&self, path: &Path) -> bool {
    self.modules.contains_key(path)
  }

  pub fn len(&self) -> usize {
    self.modules.len()
  }

  pub fn is_empty(&self) -> bool {
    self.modules.is_empty()
  }

  pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
    self.modules.keys()
  }
}

/// The three-layer registry set owned by a `Runtime`.
#[derive(Default)]
pub struct RegistrySet {
  pub main: ModuleRegistry,
  pub internal: ModuleRegistry,
  pub isolated: Option<ModuleRegistry>,
}

impl RegistrySet {
  pub fn lookup(&self, layer: Layer, path: &Path) -> Option<Rc<RefCell<Module>>> {
    match layer {
      Layer::Main => self.main.lookup(path),
      Layer::Internal => self.internal.lookup(path),
      Layer::Isolated => self.isolated.as_ref().and_then(|r| r.lookup(path)),
    }
  }

  pub fn insert(&mut self, layer: Layer, path: PathBuf, module: Rc<RefCell<Module>>) {
    match layer {
      Layer::Main => self.main.insert(path, module),
      Layer::Internal => self.internal.insert(path, module),
      Layer::Isolated => {
        self
          .isolated
          .get_or_insert_with(ModuleRegistry::default)
          .insert(path, module)
      }
    }
  }

  /// Searches every active layer for `path`, without regard to which
  /// one it's in. Used by `require.main`'s initial lookup, where the
  /// caller only has the path, not the layer it was loaded through.
  pub fn lookup_any(&self, path: &Path) -> Option<Rc<RefCell<Module>>> {
    self
      .main
      .lookup(path)
      .or_else(|| self.internal.lookup(path))
      .or_else(|| self.isolated.as_ref().and_then(|r| r.lookup(path)))
  }

  /// Rule R-LAYER: selects which layer a non-internal require should
  /// write into. Internal requests always target `internal`. Absent
  /// that, an active isolation scope wins *unless* `main` already has
  /// the module loaded — re-entrant requires from already-loaded main
  /// modules must keep observing `main`, so that behavior stays
  /// consistent after a `resetModules`.
  pub fn select_layer(&self, path: &Path, is_internal: bool) -> Layer {
    if is_internal {
      return Layer::Internal;
    }
    if self.isolated.is_some() && !self.main.contains(path) {
      Layer::Isolated
    } else {
      Layer::Main
    }
  }

  pub fn has_isolation(&self) -> bool {
    self.isolated.is_some()
  }

  /// Every path currently loaded in any active layer, used to scope
  /// `Runtime::get_source_maps` to modules actually touched so far.
  pub fn all_loaded_paths(&self) -> std::collections::HashSet<PathBuf> {
    let mut paths: std::collections::HashSet<PathBuf> =
      self.main.paths().chain(self.internal.paths()).cloned().collect();
    if let Some(isolated) = &self.isolated {
      paths.extend(isolated.paths().cloned());
    }
    paths
  }

  pub fn begin_isolation(&mut self) {
    self.isolated = Some(ModuleRegistry::default());
  }

  pub fn end_isolation(&mut self) {
    self.isolated = None;
  }

  /// Full reset (spec.md §3 Lifecycles): replace `main` with an empty
  /// registry and drop any isolated registry. `internal` is untouched.
  pub fn reset(&mut self) {
    self.main = ModuleRegistry::default();
    self.isolated = None;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::module::RequireKind;

  fn module(path: &str) -> Rc<RefCell<Module>> {
    Rc::new(RefCell::new(Module::new(
      PathBuf::from(path),
      None,
      Layer::Main,
      RequireKind::Real,
    )))
  }

  #[test]
  fn select_layer_prefers_main_when_already_loaded() {
    let mut registries = RegistrySet::default();
    let path = PathBuf::from("/a.js");
    registries.main.insert(path.clone(), module("/a.js"));
    registries.begin_isolation();

    assert_eq!(registries.select_layer(&path, false), Layer::Main);
    assert_eq!(
      registries.select_layer(&PathBuf::from("/b.js"), false),
      Layer::Isolated
    );
  }

  #[test]
  fn reset_drops_main_and_isolated_but_not_internal() {
    let mut registries = RegistrySet::default();
    registries
      .internal
      .insert(PathBuf::from("/internal.js"), module("/internal.js"));
    registries
      .main
      .insert(PathBuf::from("/a.js"), module("/a.js"));
    registries.begin_isolation();

    registries.reset();

    assert!(registries.main.is_empty());
    assert!(registries.isolated.is_none());
    assert!(registries.internal.contains(&PathBuf::from("/internal.js")));
  }
}
