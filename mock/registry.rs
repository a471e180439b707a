// Copyright 2018-2026 the module_runtime authors. MIT license.

//! The mock registry: mirrors [`crate::registry::RegistrySet`]'s
//! two-layer (main/isolated) structure, but keyed by [`ModuleId`]
//! rather than path, since a mock may back a virtual request with no
//! file-system identity at all.

use std::cell::RefCell;
use std::collections::HashMap;
use std::collections::HashSet;
use std::rc::Rc;

use crate::resolver::ModuleId;
use crate::sandbox::GlobalValue;

/// Either a resolved absolute-path string or a bare virtual mock name;
/// whichever the policy engine computed as the "mock path" candidate
/// for rule 1 (spec.md §4.3).
pub type VirtualMockSet = HashSet<String>;

#[derive(Default)]
pub struct MockRegistry {
  mocks: HashMap<ModuleId, Rc<RefCell<GlobalValue>>>,
}

impl MockRegistry {
  pub fn get(&self, id: &ModuleId) -> Option<Rc<RefCell<GlobalValue>>> {
    self.mocks.get(id).cloned()
  }

  pub fn insert(&mut self, id: ModuleId, value: Rc<RefCell<GlobalValue>>) {
    self.mocks.insert(id, value);
  }

  pub fn contains(&self, id: &ModuleId) -> bool {
    self.mocks.contains_key(id)
  }
}

#[derive(Default)]
pub struct MockRegistrySet {
  pub main: MockRegistry,
  pub isolated: Option<MockRegistry>,
}

impl MockRegistrySet {
  /// Per spec.md §4.3 "Resolution inside mocking": prefer the
  /// isolated mock registry while an isolation scope is active.
  pub fn get(&self, id: &ModuleId) -> Option<Rc<RefCell<GlobalValue>>> {
    if let Some(isolated) = &self.isolated {
      if let Some(value) = isolated.get(id) {
        return Some(value);
      }
    }
    self.main.get(id)
  }

  pub fn insert(&mut self, id: ModuleId, value: Rc<RefCell<GlobalValue>>) {
    match &mut self.isolated {
      Some(isolated) => isolated.insert(id, value),
      None => self.main.insert(id, value),
    }
  }

  pub fn begin_isolation(&mut self) {
    self.isolated = Some(MockRegistry::default());
  }

  pub fn end_isolation(&mut self) {
    self.isolated = None;
  }

  pub fn reset(&mut self) {
    self.main = MockRegistry::default();
    self.isolated = None;
  }
}
