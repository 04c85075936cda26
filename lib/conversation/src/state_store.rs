//! Conversation state storage.
//!
//! The engine holds no state of its own; it reads and writes each operator's
//! [`ConversationState`] through a [`StateStore`]. An operator with no entry
//! is not in the middle of anything.

use crate::error::StateStoreError;
use crate::state::ConversationState;
use async_trait::async_trait;
use roster_core::OperatorId;
use rootcause::Report;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Trait for conversation state storage.
///
/// Implementations must be safe to call concurrently for different operators.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Gets the operator's current state, if any.
    async fn get(
        &self,
        operator: OperatorId,
    ) -> Result<Option<ConversationState>, Report<StateStoreError>>;

    /// Sets the operator's state, replacing any previous one.
    async fn set(
        &self,
        operator: OperatorId,
        state: ConversationState,
    ) -> Result<(), Report<StateStoreError>>;

    /// Removes the operator's state, returning it.
    async fn remove(
        &self,
        operator: OperatorId,
    ) -> Result<Option<ConversationState>, Report<StateStoreError>>;

    /// Returns how many operators are mid-operation.
    async fn active_count(&self) -> Result<usize, Report<StateStoreError>>;
}

/// Process-local state store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    states: RwLock<HashMap<OperatorId, ConversationState>>,
}

impl InMemoryStateStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn get(
        &self,
        operator: OperatorId,
    ) -> Result<Option<ConversationState>, Report<StateStoreError>> {
        Ok(self.states.read().await.get(&operator).cloned())
    }

    async fn set(
        &self,
        operator: OperatorId,
        state: ConversationState,
    ) -> Result<(), Report<StateStoreError>> {
        self.states.write().await.insert(operator, state);
        Ok(())
    }

    async fn remove(
        &self,
        operator: OperatorId,
    ) -> Result<Option<ConversationState>, Report<StateStoreError>> {
        Ok(self.states.write().await.remove(&operator))
    }

    async fn active_count(&self) -> Result<usize, Report<StateStoreError>> {
        Ok(self.states.read().await.len())
    }
}
