//! Conversation engine for the roster bot.
//!
//! This crate provides:
//!
//! - **Actions**: Slash commands and button payloads
//! - **States**: Where each operator is in a multi-step operation
//! - **State Store**: Per-operator state storage behind a trait
//! - **Engine**: Transitions between states, calling the record store
//! - **Replies**: Transport-neutral text and buttons for the operator

pub mod action;
pub mod engine;
pub mod error;
pub mod render;
pub mod reply;
pub mod state;
pub mod state_store;

pub use action::{Action, Command};
pub use engine::{ConversationEngine, EngineSettings};
pub use error::{ParseActionError, ParseCommandError, StateStoreError};
pub use reply::{Button, Delivery, Keyboard, Reply};
pub use state::{Candidate, ConversationState, Draft};
pub use state_store::{InMemoryStateStore, StateStore};
