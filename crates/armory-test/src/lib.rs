//! Armory Test Harness - Replication and registry validation
//!
//! This crate provides:
//! - An in-process cluster simulator
//! - Randomized registry fuzzing
//! - Benchmarks (see `benches/`)

pub mod registry_fuzzer;
pub mod simulator;

pub use registry_fuzzer::*;
pub use simulator::*;
