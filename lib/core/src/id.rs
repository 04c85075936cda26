//! Operator identity.
//!
//! Operators are identified by the numeric user id the chat platform assigns
//! them. The platform is trusted; no further authentication happens here.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when parsing an ID from a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// The type of ID that failed to parse.
    pub id_type: &'static str,
    /// The reason for the parse failure.
    pub reason: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {}: {}", self.id_type, self.reason)
    }
}

impl std::error::Error for ParseIdError {}

/// Identity of the human driving a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperatorId(u64);

impl OperatorId {
    /// Creates an operator ID from the platform's user id.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the platform's user id.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }

    /// Returns the prefix used for display formatting.
    #[must_use]
    pub const fn prefix() -> &'static str {
        "op"
    }
}

impl fmt::Display for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", Self::prefix(), self.0)
    }
}

impl FromStr for OperatorId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("op_").unwrap_or(s);
        raw.parse::<u64>().map(Self).map_err(|e| ParseIdError {
            id_type: "OperatorId",
            reason: e.to_string(),
        })
    }
}

impl From<u64> for OperatorId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}
