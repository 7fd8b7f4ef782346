//! Armory Runtime - Node orchestration
//!
//! This crate wires the registry to the outside world:
//! - inbound registration messages and batch loading
//! - the administrative command surface
//! - the persisted registry config
//! - logging setup
//! - authority and replica nodes

pub mod adapter;
pub mod admin;
pub mod config;
pub mod logging;
pub mod node;

pub use adapter::*;
pub use admin::*;
pub use config::*;
pub use logging::*;
pub use node::*;
