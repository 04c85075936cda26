//! Process-local [`RecordStore`].
//!
//! Follows the same revision rules as the remote store: every successful
//! update bumps the revision, and updates against an old revision fail.

use crate::error::StoreError;
use crate::store::{RecordStore, StoreStatus};
use async_trait::async_trait;
use roster_core::Record;
use rootcause::Report;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct Document {
    records: Vec<Record>,
    version: u64,
}

/// In-memory record store.
#[derive(Debug)]
pub struct InMemoryRecordStore {
    document: Mutex<Option<Document>>,
    unavailable: AtomicBool,
}

impl InMemoryRecordStore {
    /// Creates a store whose document holds `records`.
    #[must_use]
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            document: Mutex::new(Some(Document {
                records,
                version: 1,
            })),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Creates a store whose document does not exist.
    #[must_use]
    pub fn missing() -> Self {
        Self {
            document: Mutex::new(None),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent call fail as if the store were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Returns a copy of the stored records, or `None` if there is no document.
    pub async fn records(&self) -> Option<Vec<Record>> {
        self.document.lock().await.as_ref().map(|d| d.records.clone())
    }

    /// Replaces the document as an outside writer would, bumping the revision.
    pub async fn replace(&self, records: Vec<Record>) {
        let mut document = self.document.lock().await;
        let version = document.as_ref().map_or(1, |d| d.version + 1);
        *document = Some(Document { records, version });
    }

    fn check_available(&self) -> Result<(), Report<StoreError>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable.into());
        }
        Ok(())
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    fn location(&self) -> String {
        "memory".to_string()
    }

    async fn fetch(&self) -> Result<Vec<Record>, Report<StoreError>> {
        self.check_available()?;
        match self.document.lock().await.as_ref() {
            Some(document) => Ok(document.records.clone()),
            None => Err(StoreError::NotFound {
                location: self.location(),
            }
            .into()),
        }
    }

    async fn revision(&self) -> Result<String, Report<StoreError>> {
        self.check_available()?;
        match self.document.lock().await.as_ref() {
            Some(document) => Ok(document.version.to_string()),
            None => Err(StoreError::NotFound {
                location: self.location(),
            }
            .into()),
        }
    }

    async fn update(&self, records: &[Record], revision: &str) -> Result<(), Report<StoreError>> {
        self.check_available()?;
        let mut guard = self.document.lock().await;
        let Some(document) = guard.as_mut() else {
            return Err(StoreError::NotFound {
                location: self.location(),
            }
            .into());
        };

        if document.version.to_string() != revision {
            return Err(StoreError::Conflict {
                revision: revision.to_string(),
            }
            .into());
        }

        document.records = records.to_vec();
        document.version += 1;
        Ok(())
    }

    async fn status(&self) -> StoreStatus {
        if self.unavailable.load(Ordering::SeqCst) {
            return StoreStatus {
                exists: false,
                status_code: None,
            };
        }
        let exists = self.document.lock().await.is_some();
        StoreStatus {
            exists,
            status_code: Some(if exists { 200 } else { 404 }),
        }
    }
}
