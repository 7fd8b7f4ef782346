//! Armory Transport Layer - Authority to replica links
//!
//! This crate provides:
//! - The authority-side hub that fans changes out to replicas
//! - Replica endpoints and the background receive loop

pub mod hub;
pub mod link;

pub use hub::*;
pub use link::*;
