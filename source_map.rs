// Copyright 2018-2026 the module_runtime authors. MIT license.

//! Source-map registry (component C9, spec.md §4.7). Records where
//! each executed file's generated source map lives, and which files
//! need their coverage remapped through it. A thin, deliberately dumb
//! registry — the teacher keeps an analogous one-purpose record in
//! `cli/cache/code_cache.rs`'s style of small, single-table caches.

use std::collections::HashMap;
use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;

#[derive(Default)]
pub struct SourceMapRegistry {
  maps: HashMap<PathBuf, PathBuf>,
  needs_coverage_mapped: HashSet<PathBuf>,
}

impl SourceMapRegistry {
  pub fn register(
    &mut self,
    file_path: PathBuf,
    source_map_path: PathBuf,
    needs_coverage_map: bool,
  ) {
    if needs_coverage_map {
      self.needs_coverage_mapped.insert(file_path.clone());
    }
    self.maps.insert(file_path, source_map_path);
  }

  pub fn get(&self, file_path: &Path) -> Option<&PathBuf> {
    self.maps.get(file_path)
  }

  /// Restricts to paths present in both `files` and
  /// `needs_coverage_mapped`, and whose sidecar still exists on disk
  /// (spec.md §8's source-map round-trip invariant).
  pub fn get_filtered_for_files(
    &self,
    files: &HashSet<PathBuf>,
  ) -> HashMap<PathBuf, PathBuf> {
    files
      .iter()
      .filter(|f| self.needs_coverage_mapped.contains(*f))
      .filter_map(|f| {
        let map_path = self.maps.get(f)?;
        if map_path.exists() {
          Some((f.clone(), map_path.clone()))
        } else {
          None
        }
      })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn round_trip_requires_registration_and_coverage_flag() {
    let mut registry = SourceMapRegistry::default();
    let dir = tempfile::tempdir().unwrap();
    let sidecar = dir.path().join("a.js.map");
    std::fs::write(&sidecar, "{}").unwrap();

    let f = PathBuf::from("/a.js");
    registry.register(f.clone(), sidecar.clone(), true);

    let mut set = HashSet::new();
    set.insert(f.clone());
    let result = registry.get_filtered_for_files(&set);
    assert_eq!(result.get(&f), Some(&sidecar));

    // A file registered without the coverage flag is excluded even
    // though its sidecar exists.
    let g = PathBuf::from("/b.js");
    registry.register(g.clone(), sidecar.clone(), false);
    let mut set2 = HashSet::new();
    set2.insert(g);
    assert!(registry.get_filtered_for_files(&set2).is_empty());
  }
}
