//! Fail-soft access to the record document.
//!
//! The conversation layer never sees store errors. A load that goes wrong
//! yields an empty collection (or `None` when loading for a write) and a
//! save that goes wrong yields `false`; the cause is logged here.

use crate::store::{RecordStore, StoreStatus};
use roster_core::Record;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Load/save facade over a [`RecordStore`].
#[derive(Clone)]
pub struct RecordGateway {
    store: Arc<dyn RecordStore>,
}

impl RecordGateway {
    /// Wraps a store.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Returns the location of the underlying document.
    #[must_use]
    pub fn location(&self) -> String {
        self.store.location()
    }

    /// Loads the full collection, or an empty one if anything goes wrong.
    pub async fn load(&self) -> Vec<Record> {
        self.load_for_update().await.unwrap_or_default()
    }

    /// Loads the full collection as the base of a write.
    ///
    /// Returns `None` when the document could not be read or decoded. A
    /// caller must not save a collection built from nothing in that case,
    /// since it would replace every record already stored.
    #[instrument(skip(self), fields(location = %self.store.location()))]
    pub async fn load_for_update(&self) -> Option<Vec<Record>> {
        match self.store.fetch().await {
            Ok(records) => {
                info!(count = records.len(), "loaded records");
                Some(records)
            }
            Err(e) => {
                warn!(error = %e, "load failed");
                None
            }
        }
    }

    /// Saves the full collection, returning whether the write was accepted.
    ///
    /// The revision is read immediately before the write and sent along with
    /// it, so a document that changed in between is not overwritten. A
    /// missing document is never created.
    #[instrument(skip(self, records), fields(location = %self.store.location(), count = records.len()))]
    pub async fn save(&self, records: &[Record]) -> bool {
        let revision = match self.store.revision().await {
            Ok(revision) => revision,
            Err(e) => {
                warn!(error = %e, "save aborted, could not read revision");
                return false;
            }
        };

        match self.store.update(records, &revision).await {
            Ok(()) => {
                info!("saved records");
                true
            }
            Err(e) => {
                warn!(error = %e, "save rejected");
                false
            }
        }
    }

    /// Reports whether the document exists, for diagnostics.
    pub async fn status(&self) -> StoreStatus {
        self.store.status().await
    }
}
