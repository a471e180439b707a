// Copyright 2018-2026 the module_runtime authors. MIT license.

//! Construction-time configuration (spec.md §6, "Inputs at
//! construction"). Kept as a plain struct assembled once per test
//! file, in the teacher's style for config that doesn't need a
//! generated builder (`cli/lib/worker.rs`'s `WorkerOptions`/
//! `BootstrapOptions` are likewise plain structs with public fields).

use std::cell::OnceCell;
use std::path::PathBuf;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub struct NameMapperRule {
  pub pattern: regex::Regex,
  pub replacement: String,
}

#[derive(Debug, Clone)]
pub struct TransformConfig {
  pub test_pattern: regex::Regex,
  pub transform_name: String,
}

#[derive(Clone)]
pub struct RuntimeConfig {
  /// Project root, against which `roots`/`module_directories` resolve.
  /// Named explicitly in SPEC_FULL even though spec.md only implies it
  /// through "third-party directory segment" language.
  pub root_dir: PathBuf,
  pub roots: Vec<PathBuf>,
  pub extensions: Vec<String>,
  pub module_directories: Vec<String>,
  pub name_mapper: Vec<NameMapperRule>,
  pub unmock_patterns: Vec<String>,
  pub automock: bool,
  pub setup_files: Vec<PathBuf>,
  pub transforms: Vec<TransformConfig>,
  pub extra_globals: Vec<String>,
  pub collect_coverage: bool,
  /// Where the transform cache's disk store lives.
  pub cache_dir: PathBuf,
  /// Custom formatter for a user `process.exit` call, invoked by
  /// [`crate::runtime::Runtime::handle_process_exit`] — the call site
  /// an embedding `Sandbox` implementation is expected to invoke when
  /// user code calls `process.exit` from within an executing module
  /// (spec.md §7). `None` falls back to the runtime's default
  /// stderr formatting.
  #[allow(clippy::type_complexity)]
  pub on_process_exit: Option<std::rc::Rc<dyn Fn(&[String], &str)>>,
  /// Memoized composite unmock regex (spec.md §9 design note: "the
  /// unmock regex is cached keyed by the project config"). A
  /// `RuntimeConfig` is built once per test file and never mutated
  /// afterwards, so a plain `OnceCell` keyed by the whole config's
  /// lifetime satisfies that note without a process-global singleton.
  unmock_regex_cache: OnceCell<Option<Rc<regex::Regex>>>,
}

impl std::fmt::Debug for RuntimeConfig {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("RuntimeConfig")
      .field("root_dir", &self.root_dir)
      .field("roots", &self.roots)
      .field("extensions", &self.extensions)
      .field("module_directories", &self.module_directories)
      .field("unmock_patterns", &self.unmock_patterns)
      .field("automock", &self.automock)
      .field("setup_files", &self.setup_files)
      .field("extra_globals", &self.extra_globals)
      .field("collect_coverage", &self.collect_coverage)
      .field("cache_dir", &self.cache_dir)
      .finish_non_exhaustive()
  }
}

impl Default for RuntimeConfig {
  fn default() -> Self {
    Self {
      root_dir: PathBuf::from("."),
      roots: Vec::new(),
      extensions: vec!["js".to_string()],
      module_directories: vec!["node_modules".to_string()],
      name_mapper: Vec::new(),
      unmock_patterns: Vec::new(),
      automock: false,
      setup_files: Vec::new(),
      transforms: Vec::new(),
      extra_globals: Vec::new(),
      collect_coverage: false,
      cache_dir: std::env::temp_dir().join("module_runtime_cache"),
      on_process_exit: None,
      unmock_regex_cache: OnceCell::new(),
    }
  }
}

impl RuntimeConfig {
  /// A composite regex matching any of `unmock_patterns`, used by mock
  /// policy rules 7 and 8. `None` if no patterns are configured (an
  /// empty alternation would match everything, which is the opposite
  /// of "nothing is unmocked by pattern"). Compiled once and memoized
  /// for the lifetime of this config (spec.md §9: "the unmock regex is
  /// cached keyed by the project config") rather than recompiled on
  /// every require.
  pub fn unmock_regex(&self) -> Option<Rc<regex::Regex>> {
    self
      .unmock_regex_cache
      .get_or_init(|| {
        if self.unmock_patterns.is_empty() {
          return None;
        }
        let joined = self
          .unmock_patterns
          .iter()
          .map(|p| format!("(?:{p})"))
          .collect::<Vec<_>>()
          .join("|");
        regex::Regex::new(&joined).ok().map(Rc::new)
      })
      .clone()
  }

  pub fn transform_for(&self, path: &std::path::Path) -> Option<&TransformConfig> {
    let path_str = path.to_string_lossy();
    self
      .transforms
      .iter()
      .find(|t| t.test_pattern.is_match(&path_str))
  }
}
