// Copyright 2018-2026 the module_runtime authors. MIT license.

//! Auto-mock synthesis: structural metadata capture plus regeneration
//! from that metadata (spec.md §4.3, "Otherwise: synthesize an
//! auto-mock"). Metadata is cached per path so that repeated requires
//! of the same module don't re-walk its shape, but regeneration always
//! produces a fresh instance, per the "auto-mock purity" invariant —
//! two tests' automocks of the same module must not alias each other.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use crate::sandbox::GlobalValue;

/// A structural snapshot of a value's shape, not its contents: Jest's
/// real automocker walks an object graph and replaces every function
/// with a `jest.fn()` and every nested object/array with a recursively
/// mocked counterpart, leaving primitives as placeholders. This enum
/// captures exactly that shape so it can be regenerated independently
/// of the original module instance.
#[derive(Debug, Clone)]
pub enum MockMetadata {
  Function,
  Object(HashMap<String, MockMetadata>),
  Array(Vec<MockMetadata>),
  Primitive,
}

impl MockMetadata {
  pub fn is_empty(&self) -> bool {
    matches!(self, MockMetadata::Object(fields) if fields.is_empty())
  }
}

#[derive(Default)]
pub struct MockMetaDataCache {
  entries: HashMap<PathBuf, MockMetadata>,
}

impl MockMetaDataCache {
  pub fn get_or_insert_with(
    &mut self,
    path: &Path,
    compute: impl FnOnce() -> MockMetadata,
  ) -> MockMetadata {
    if let Some(existing) = self.entries.get(path) {
      return existing.clone();
    }
    let metadata = compute();
    self.entries.insert(path.to_path_buf(), metadata.clone());
    metadata
  }

  pub fn get(&self, path: &Path) -> Option<MockMetadata> {
    self.entries.get(path).cloned()
  }

  pub fn insert(&mut self, path: PathBuf, metadata: MockMetadata) {
    self.entries.insert(path, metadata);
  }
}

/// Synthesizes a brand-new automock value from `metadata`, independent
/// of any previously generated instance — the mock-function subsystem
/// (`ModuleMocker::generate_from_metadata`) is expected to mint a new
/// `jest.fn()`-equivalent for every `Function` node on every call.
pub fn regenerate(
  metadata: &MockMetadata,
  mocker: &dyn crate::sandbox::ModuleMocker,
) -> GlobalValue {
  mocker.generate_from_metadata(metadata)
}

/// Derives structural metadata directly from a value, used as the
/// fallback when a `ModuleMocker` implementation delegates shape
/// inspection back to the crate instead of doing it itself.
pub fn metadata_from_value(value: &GlobalValue) -> MockMetadata {
  match value {
    GlobalValue::Object(fields) => MockMetadata::Object(
      fields
        .iter()
        .map(|(k, v)| (k.clone(), metadata_from_value(&v.borrow())))
        .collect(),
    ),
    GlobalValue::Array(items) => MockMetadata::Array(
      items
        .iter()
        .map(|v| metadata_from_value(&v.borrow()))
        .collect(),
    ),
    // There is no dedicated "function" variant of `GlobalValue` in
    // this crate's data model (functions live only on the far side of
    // `Sandbox`); a real `ModuleMocker` implementation is expected to
    // tag callables before they reach here.
    _ => MockMetadata::Primitive,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn caches_by_path_and_returns_clones() {
    let mut cache = MockMetaDataCache::default();
    let path = PathBuf::from("/left-pad.js");
    let mut calls = 0;
    let first = cache.get_or_insert_with(&path, || {
      calls += 1;
      MockMetadata::Object(HashMap::new())
    });
    let second = cache.get_or_insert_with(&path, || {
      calls += 1;
      MockMetadata::Object(HashMap::new())
    });
    assert_eq!(calls, 1);
    assert!(first.is_empty());
    assert!(second.is_empty());
  }
}
