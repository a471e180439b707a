// Copyright 2018-2026 the module_runtime authors. MIT license.

pub mod logger;
