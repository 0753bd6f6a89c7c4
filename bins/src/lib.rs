//! Shared plumbing for the engine's binaries: CLI/logging setup and the
//! built-in simulated exchange adapter.

pub mod common;
pub mod simulated;
