//! Error types for the conversation crate.
//!
//! - `StateStoreError`: Errors from conversation state storage
//! - `ParseActionError`: Unknown button payloads
//! - `ParseCommandError`: Unknown command names

use roster_core::OperatorId;
use std::fmt;

/// Errors from conversation state storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateStoreError {
    /// Storage operation failed.
    StorageFailed {
        operator: OperatorId,
        reason: String,
    },
}

impl fmt::Display for StateStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StorageFailed { operator, reason } => {
                write!(f, "conversation storage failed for {operator}: {reason}")
            }
        }
    }
}

impl std::error::Error for StateStoreError {}

/// A button payload that is not one of the known actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseActionError {
    pub payload: String,
}

impl fmt::Display for ParseActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown action: {}", self.payload)
    }
}

impl std::error::Error for ParseActionError {}

/// A command name that is not one of the known commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCommandError {
    pub name: String,
}

impl fmt::Display for ParseCommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown command: {}", self.name)
    }
}

impl std::error::Error for ParseCommandError {}
