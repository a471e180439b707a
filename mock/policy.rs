// Copyright 2018-2026 the module_runtime authors. MIT license.

//! The mock policy engine proper: `should_mock`, spec.md §4.3's
//! nine-rule, first-match-wins decision procedure, plus the policy
//! tables it reads and memoizes into.
//!
//! Resolved decision for an ambiguity spec.md leaves implicit: the
//! `transitiveShouldMock` table (populated by `deepUnmock`, spec.md
//! §4.6) is never explicitly cited inside the nine numbered rules of
//! §4.3 — only `shouldUnmockTransitiveCache` (the *memo*, populated by
//! rule 7) is. Read literally, `deepUnmock("pkg")` would therefore
//! only stop `pkg` itself from being mocked (via rule 2's explicit
//! override), never its dependencies, despite the table's own name and
//! doc comment ("propagation rule for dependencies of unmocked
//! packages"). This crate resolves the gap by having rule 7 fire
//! whenever *either* the vendored-directory condition holds *or* the
//! caller (`from`) was itself deep-unmocked — i.e. `transitiveShouldMock`
//! feeds the same memoization path the vendored rule does, rather than
//! being a second disconnected mechanism. See DESIGN.md.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::rc::Rc;

use regex::Regex;

use crate::mock::automock::MockMetaDataCache;
use crate::mock::registry::VirtualMockSet;
use crate::resolver::ModuleId;
use crate::resolver::Resolver;
use crate::sandbox::GlobalValue;

pub type MockFactory = Rc<dyn Fn() -> GlobalValue>;

#[derive(Default)]
pub struct PolicyTables {
  pub explicit_should_mock: HashMap<ModuleId, bool>,
  pub mock_factories: HashMap<ModuleId, MockFactory>,
  pub virtual_mocks: VirtualMockSet,
  pub transitive_should_mock: HashMap<ModuleId, bool>,
  pub should_mock_cache: HashMap<ModuleId, bool>,
  pub should_unmock_transitive_cache: HashMap<(PathBuf, ModuleId), bool>,
  pub mock_meta_data_cache: MockMetaDataCache,
  pub automock: bool,
}

impl PolicyTables {
  /// Drops every memoization table but preserves explicit/virtual/
  /// factory registrations, matching the reset invariant (spec.md
  /// §8): "mock policy (explicit/virtual/factory) is preserved across
  /// the reset".
  pub fn reset_memoization(&mut self) {
    self.should_mock_cache.clear();
    self.should_unmock_transitive_cache.clear();
  }

  /// spec.md §4.3: the nine-rule, first-match-wins decision procedure.
  pub fn should_mock(
    &mut self,
    from: &Path,
    request: &str,
    id: &ModuleId,
    resolver: &dyn Resolver,
    unmock_regex: Option<&Regex>,
  ) -> bool {
    // Rule 1: virtual mock. The "mock path" candidate is the real
    // resolved path when one exists, else the bare request string —
    // this is how a module with no file-system backing can still be
    // registered as virtual under its request name.
    let mock_path_candidate = resolver
      .get_module(request)
      .map(|p| p.to_string_lossy().into_owned())
      .unwrap_or_else(|| request.to_string());
    if self.virtual_mocks.contains(&mock_path_candidate) {
      return true;
    }

    // Rule 2: explicit override.
    if let Some(explicit) = self.explicit_should_mock.get(id) {
      return *explicit;
    }

    // Rule 3: core modules are never mocked.
    if resolver.is_core_module(request) {
      return false;
    }

    let resolved_path = resolver.get_module_path(from, request).ok();

    // Rule 4: previously marked transitively unmocked.
    let from_id = resolver.get_module_id(&VirtualMockSet::new(), from, None);
    if self
      .should_unmock_transitive_cache
      .get(&(from.to_path_buf(), id.clone()))
      == Some(&true)
    {
      return false;
    }

    // Rule 5: automock globally disabled.
    if !self.automock {
      return false;
    }

    // Rule 6: memoized.
    if let Some(cached) = self.should_mock_cache.get(id) {
      return *cached;
    }

    // Rule 7: vendored-unmock rule, extended (see module doc) to also
    // fire when the caller itself was deep-unmocked.
    let vendored_condition = resolved_path
      .as_ref()
      .map(|resolved| resolver.is_vendored(from) && resolver.is_vendored(resolved))
      .unwrap_or(false);
    let deep_unmocked_caller = self.transitive_should_mock.get(&from_id) == Some(&false);
    if vendored_condition || deep_unmocked_caller {
      let caller_unmocked = unmock_regex
        .map(|re| re.is_match(&from.to_string_lossy()))
        .unwrap_or(false)
        || self.explicit_should_mock.get(id) == Some(&false);
      if caller_unmocked || deep_unmocked_caller {
        self
          .should_unmock_transitive_cache
          .insert((from.to_path_buf(), id.clone()), true);
        self.should_mock_cache.insert(id.clone(), false);
        return false;
      }
    }

    // Rule 8: unmock pattern list.
    if let (Some(re), Some(resolved)) = (unmock_regex, &resolved_path) {
      if re.is_match(&resolved.to_string_lossy()) {
        self.should_mock_cache.insert(id.clone(), false);
        return false;
      }
    }

    // Rule 9: default.
    self.should_mock_cache.insert(id.clone(), true);
    true
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::InMemoryResolver;

  #[test]
  fn vendored_unmock_propagates_to_dependency() {
    let mut resolver = InMemoryResolver::default();
    resolver.add_file("/proj/node_modules/left-pad/index.js", "");
    resolver.add_file("/proj/node_modules/left-pad/util.js", "");
    let mut policy = PolicyTables {
      automock: true,
      ..Default::default()
    };
    let unmock_regex = Regex::new("left-pad").unwrap();

    let from = PathBuf::from("/proj/node_modules/left-pad/index.js");
    let id = resolver.get_module_id(
      &VirtualMockSet::new(),
      &from,
      Some("./util.js"),
    );
    let mocked = policy.should_mock(&from, "./util.js", &id, &resolver, Some(&unmock_regex));
    assert!(!mocked, "dependency of an unmocked vendored package must resolve to the real module");
  }

  #[test]
  fn virtual_mock_outranks_an_explicit_unmock() {
    let resolver = InMemoryResolver::default();
    let mut policy = PolicyTables {
      automock: false,
      ..Default::default()
    };
    let from = PathBuf::from("/proj/test.js");
    let id = resolver.get_module_id(&VirtualMockSet::new(), &from, Some("virtual-thing"));
    // Registered virtual, but also explicitly unmocked — rule 1 must
    // still win per spec.md §8's "virtual > explicit" precedence.
    policy.virtual_mocks.insert("virtual-thing".to_string());
    policy.explicit_should_mock.insert(id.clone(), false);

    let mocked = policy.should_mock(&from, "virtual-thing", &id, &resolver, None);
    assert!(mocked, "a virtual mock must outrank an explicit unmock");
  }

  #[test]
  fn explicit_override_wins_over_default_automock() {
    let mut resolver = InMemoryResolver::default();
    resolver.add_file("/proj/x.js", "");
    let mut policy = PolicyTables {
      automock: true,
      ..Default::default()
    };
    let id = resolver.get_module_id(&VirtualMockSet::new(), Path::new("/proj/test.js"), Some("./x.js"));
    policy.explicit_should_mock.insert(id.clone(), false);

    let mocked = policy.should_mock(
      Path::new("/proj/test.js"),
      "./x.js",
      &id,
      &resolver,
      None,
    );
    assert!(!mocked);
  }
}
