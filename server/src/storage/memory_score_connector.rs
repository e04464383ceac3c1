// server/src/storage/memory_score_connector.rs
use async_trait::async_trait;
use log::debug;
use std::sync::{Mutex, MutexGuard};

use super::score_connector::{DocumentEdit, ScoreConnector};
use crate::error::PersistenceError;

/// Keeps the score document in process memory. Used by tests and by
/// `--use-memory-store`; scores are lost on restart.
#[derive(Default)]
pub struct MemoryScoreConnector {
    document: Mutex<Option<String>>,
}

impl MemoryScoreConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an already stored document, which need not be well formed.
    pub fn with_document(raw: impl Into<String>) -> Self {
        Self {
            document: Mutex::new(Some(raw.into())),
        }
    }

    /// Current raw document.
    pub fn document(&self) -> Option<String> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Option<String>> {
        // The guarded value is a plain string, a panicking writer cannot leave it half updated.
        self.document
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ScoreConnector for MemoryScoreConnector {
    async fn fetch_document(&self) -> Result<Option<String>, PersistenceError> {
        Ok(self.document())
    }

    async fn update_document(&self, mut edit: DocumentEdit) -> Result<bool, PersistenceError> {
        let mut document = self.lock();
        match edit(document.as_deref())? {
            Some(next) => {
                debug!("memory store: writing {} bytes", next.len());
                *document = Some(next);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
