//! In-tree test suites exercising the engine end to end.
//!
//! Module-level unit tests live beside the code; these suites cover the
//! cross-module behavior: full ticks, engagement sequences, scenario loads,
//! and determinism.

mod helpers;
mod integration;
