// Copyright 2018-2026 the module_runtime authors. MIT license.

use std::path::PathBuf;

/// Errors surfaced by the runtime's public operations.
///
/// Disposition follows the table in the runtime's error-handling design:
/// most variants are enriched and rethrown to the caller unchanged: the
/// one deliberate exception is a sandbox torn down mid-execution, which
/// is never represented as an `Err` (see [`crate::executor::ExecOutcome`]).
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
  #[error("Cannot find module '{request}' from '{}'{}", from.display(), format_suggestions(suggestions))]
  ModuleNotFound {
    request: String,
    from: PathBuf,
    suggestions: Vec<String>,
  },

  #[error("transform failed for '{}': {source}", path.display())]
  Transform {
    path: PathBuf,
    #[source]
    source: crate::transform::TransformError,
  },

  #[error(
    "Automock of '{}' produced an empty module. See the manual mock \
     documentation for modules whose shape cannot be derived automatically.",
    path.display()
  )]
  AutoMockEmpty { path: PathBuf },

  #[error("A jest.isolateModules() is already in progress")]
  NestedIsolation,

  #[error(
    "You are trying to access '{name}' on the sandbox global, but it has \
     not been configured as an extra global for this runtime"
  )]
  MissingExtraGlobal { name: String },

  #[error("require.resolve(...) expects a non-empty string")]
  EmptyResolveRequest,

  #[error(transparent)]
  Resolver(#[from] crate::resolver::ResolverError),

  #[error(transparent)]
  Sandbox(#[from] crate::sandbox::SandboxError),
}

fn format_suggestions(suggestions: &[String]) -> String {
  if suggestions.is_empty() {
    String::new()
  } else {
    format!("\n\nDid you mean one of these?\n{}", suggestions.join("\n"))
  }
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
