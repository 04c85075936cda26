//! Error types for the store crate.
//!
//! Store operations return `Report<StoreError>`. The gateway flattens every
//! variant into an empty load or a failed save, so these exist mainly for
//! logging and for tests that talk to a store directly.

use std::fmt;

/// Errors from record store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The document does not exist.
    NotFound { location: String },
    /// The request never produced a response.
    Transport { reason: String },
    /// The store answered with a status we do not accept.
    UnexpectedStatus { status: u16, body: String },
    /// The document content is not a record list.
    MalformedDocument { reason: String },
    /// The write was rejected because the document changed since the
    /// revision was read.
    Conflict { revision: String },
    /// The collection could not be encoded for upload.
    Encoding { reason: String },
    /// The store is not reachable.
    Unavailable,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { location } => write!(f, "document not found: {location}"),
            Self::Transport { reason } => write!(f, "request failed: {reason}"),
            Self::UnexpectedStatus { status, body } => {
                write!(f, "unexpected status {status}: {body}")
            }
            Self::MalformedDocument { reason } => {
                write!(f, "malformed document: {reason}")
            }
            Self::Conflict { revision } => {
                write!(f, "document changed since revision {revision}")
            }
            Self::Encoding { reason } => write!(f, "failed to encode records: {reason}"),
            Self::Unavailable => write!(f, "store unavailable"),
        }
    }
}

impl std::error::Error for StoreError {}
