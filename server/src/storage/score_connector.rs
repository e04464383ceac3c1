// server/src/storage/score_connector.rs
use async_trait::async_trait;

use crate::error::PersistenceError;

/// Computes the next stored document from the current one. Returning `None`
/// leaves the store untouched. May be invoked more than once when a backend
/// retries after a concurrent write.
pub type DocumentEdit = Box<dyn FnMut(Option<&str>) -> Result<Option<String>, PersistenceError> + Send>;

/// Backend holding the single raw score document.
#[async_trait]
pub trait ScoreConnector: Send + Sync {
    /// Returns the stored document, or `None` if nothing has been written yet.
    async fn fetch_document(&self) -> Result<Option<String>, PersistenceError>;

    /// Applies `edit` atomically with respect to other updates and reports
    /// whether a new document was written.
    async fn update_document(&self, edit: DocumentEdit) -> Result<bool, PersistenceError>;
}
