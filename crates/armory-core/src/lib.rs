//! Armory Core - Fundamental types shared by every layer
//!
//! This crate defines:
//! - Identifiers (`namespace:name` item keys)
//! - Weapon categories and kinds
//! - Error taxonomy
//! - Seams to the item catalog and per-instance classifiers

pub mod catalog;
pub mod class;
pub mod error;
pub mod id;

pub use catalog::*;
pub use class::*;
pub use error::*;
pub use id::*;
