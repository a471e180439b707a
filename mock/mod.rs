// Copyright 2018-2026 the module_runtime authors. MIT license.

//! The mock registry and policy engine (component C5, spec.md §4.3) —
//! the largest single component in the spec's budget, because it
//! fuses a second registry (mirroring C4's structure but keyed by
//! module-id), a set of policy tables, and the decision procedure that
//! chooses between a real module, a user factory, a manual mock, and
//! an auto-mock.

pub mod automock;
pub mod policy;
pub mod registry;
