//! Document store contract plus redb-backed and in-process implementations.

mod memory;
mod redb_store;
mod tables;

pub use memory::MemoryStore;
pub use redb_store::Database;

use crate::{
    error::AppError,
    models::document::{Document, DocumentPatch},
};

/// Key-value document store consumed by the editor's persistence pipeline.
///
/// Every call may fail; callers surface failures as outcomes rather than
/// aborting. Implementations must be shareable with the backend worker thread.
pub trait DocumentStore: Send + 'static {
    /// Fetch a document by id.
    ///
    /// # Returns
    /// `Ok(Some(document))` when found, `Ok(None)` when missing.
    ///
    /// # Errors
    /// Returns an error when storage access or decoding fails.
    fn get(&self, id: &str) -> Result<Option<Document>, AppError>;

    /// Insert a new document.
    ///
    /// # Errors
    /// Returns an error when the id already exists or storage access fails.
    fn create(&self, document: &Document) -> Result<(), AppError>;

    /// Apply a partial update to an existing document.
    ///
    /// # Returns
    /// The stored document after the patch was applied.
    ///
    /// # Errors
    /// Returns [`AppError::NotFound`] when the id is unknown, or a storage
    /// error when the write fails.
    fn put(&self, id: &str, patch: &DocumentPatch) -> Result<Document, AppError>;

    /// List every document, most recently updated first.
    ///
    /// # Errors
    /// Returns an error when storage access or decoding fails.
    fn list_all(&self) -> Result<Vec<Document>, AppError>;

    /// Delete a document by id.
    ///
    /// # Returns
    /// `true` when a row was deleted, `false` when it did not exist.
    ///
    /// # Errors
    /// Returns an error when storage access fails.
    fn delete(&self, id: &str) -> Result<bool, AppError>;
}
