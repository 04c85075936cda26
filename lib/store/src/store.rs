//! Record store trait and related types.
//!
//! The whole record collection lives in one remote document. Writers must
//! present the revision they read; the store rejects the write if the
//! document moved on in the meantime.

use crate::error::StoreError;
use async_trait::async_trait;
use roster_core::{Record, Result as StoreResult};
use serde_json::Value as JsonValue;

/// Result of probing the remote document, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStatus {
    /// Whether the document currently exists.
    pub exists: bool,
    /// Status code of the existence check, if one was answered.
    pub status_code: Option<u16>,
}

/// Revision-guarded access to the record document.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Human-readable location of the document.
    fn location(&self) -> String;

    /// Reads and decodes the document.
    async fn fetch(&self) -> StoreResult<Vec<Record>, StoreError>;

    /// Returns the current content-hash token of the document.
    ///
    /// Fails with [`StoreError::NotFound`] if the document does not exist.
    async fn revision(&self) -> StoreResult<String, StoreError>;

    /// Replaces the document content, provided it is still at `revision`.
    async fn update(&self, records: &[Record], revision: &str) -> StoreResult<(), StoreError>;

    /// Checks whether the document exists.
    async fn status(&self) -> StoreStatus;
}

/// Decodes document content into a record list.
///
/// Accepts a bare JSON array, or an object whose `users` member is one.
pub fn parse_document(content: &str) -> Result<Vec<Record>, StoreError> {
    let value: JsonValue =
        serde_json::from_str(content).map_err(|e| StoreError::MalformedDocument {
            reason: e.to_string(),
        })?;

    let list = match value {
        JsonValue::Array(items) => JsonValue::Array(items),
        JsonValue::Object(mut map) => match map.remove("users") {
            Some(users @ JsonValue::Array(_)) => users,
            Some(_) => {
                return Err(StoreError::MalformedDocument {
                    reason: "'users' is not a list".to_string(),
                });
            }
            None => {
                return Err(StoreError::MalformedDocument {
                    reason: "object has no 'users' member".to_string(),
                });
            }
        },
        other => {
            return Err(StoreError::MalformedDocument {
                reason: format!("expected a list, found {}", json_kind(&other)),
            });
        }
    };

    serde_json::from_value(list).map_err(|e| StoreError::MalformedDocument {
        reason: e.to_string(),
    })
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "a list",
        JsonValue::Object(_) => "an object",
    }
}
