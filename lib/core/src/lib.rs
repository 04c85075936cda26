//! Core domain types and utilities for the roster bot.
//!
//! This crate provides the record type stored in the remote document, the
//! operator identity used to key conversations, and the shared error alias.

pub mod error;
pub mod id;
pub mod record;

pub use error::Result;
pub use id::{OperatorId, ParseIdError};
pub use record::{DEFAULT_EXPIRATION, Record};
