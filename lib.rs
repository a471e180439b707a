// Copyright 2018-2026 the module_runtime authors. MIT license.

//! Isolated test runtime: loads, transforms, mocks and executes a test
//! file's module graph inside a sandboxed global environment.

pub mod cache;
pub mod config;
pub mod error;
pub mod executor;
pub mod handle;
pub mod mock;
pub mod module;
pub mod registry;
pub mod require;
pub mod resolver;
pub mod runtime;
pub mod sandbox;
pub mod source_map;
pub mod teardown;
pub mod transform;
pub mod util;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::RuntimeConfig;
pub use error::RuntimeError;
pub use runtime::Runtime;
