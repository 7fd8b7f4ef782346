//! Error types for Armory

use thiserror::Error;

use crate::{Category, Identifier};

/// Core Armory errors
///
/// None of these are fatal: every failed operation leaves the registry
/// exactly as it was.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArmoryError {
    // Input errors
    #[error("Invalid identifier {input:?}: {reason}")]
    Parse { input: String, reason: String },

    #[error("Item {0} could not be found")]
    NotFound(Identifier),

    #[error("Unknown message key: {0}")]
    UnknownKey(String),

    // Registry errors
    #[error("Cannot add {id} to the {target} list - already on the {existing} list")]
    Conflict {
        id: Identifier,
        target: Category,
        existing: Category,
    },

    // Wire errors
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Buffer too short: expected {expected}, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },

    #[error("Unknown category: {0}")]
    UnknownCategory(u8),

    // Transport errors
    #[error("Transport error: {0}")]
    Transport(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),
}

/// Result type for Armory operations
pub type ArmoryResult<T> = Result<T, ArmoryError>;
