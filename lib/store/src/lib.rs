//! Record document gateway for the roster bot.
//!
//! This crate provides:
//!
//! - **RecordStore trait**: Revision-guarded access to the remote document
//! - **GithubStore**: The GitHub contents API implementation
//! - **InMemoryRecordStore**: A process-local implementation
//! - **RecordGateway**: Fail-soft load/save used by the conversation engine

pub mod error;
pub mod gateway;
pub mod github;
pub mod memory;
pub mod store;

pub use error::StoreError;
pub use gateway::RecordGateway;
pub use github::{GithubConfig, GithubStore};
pub use memory::InMemoryRecordStore;
pub use store::{RecordStore, StoreStatus, parse_document};
