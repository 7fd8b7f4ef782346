//! Armory State - The weapon classification registry
//!
//! This crate implements:
//! - The category store (one category per identifier)
//! - Registration with override and conflict handling
//! - Sword/weapon classification predicates
//! - The replica session and its apply step

pub mod registry;
pub mod replica;
pub mod store;

pub use registry::*;
pub use replica::*;
pub use store::*;
