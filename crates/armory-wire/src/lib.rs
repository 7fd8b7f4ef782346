//! Armory Wire Protocol - Replication message format
//!
//! This crate implements the byte layout of the two messages an authority
//! sends to its replicas:
//! - FullState: every category list, sent on connect
//! - SyncEntry: one (category, identifier) pair, sent per change

pub mod codec;
pub mod message;

pub use codec::*;
pub use message::*;
