//! Document storage backed by redb.

use super::tables::{reverse_timestamp_key, DOCUMENTS, DOCUMENTS_BY_UPDATED, REDB_FILE_NAME};
use super::DocumentStore;
use crate::{
    error::AppError,
    models::document::{Document, DocumentPatch},
};
use redb::{ReadableDatabase, ReadableTable};
use std::path::Path;
use std::sync::Arc;

/// Database handle owning the redb file for document rows.
pub struct Database {
    db: Arc<redb::Database>,
}

fn deserialize_document(bytes: &[u8]) -> Result<Document, AppError> {
    Ok(bincode::deserialize(bytes)?)
}

impl Database {
    /// Open (or create) the database under directory `path`.
    ///
    /// # Returns
    /// A [`Database`] with all tables initialized.
    ///
    /// # Errors
    /// Returns an error when the directory cannot be created or redb fails to
    /// open the file or initialize tables.
    pub fn new(path: &str) -> Result<Self, AppError> {
        let dir = Path::new(path);
        std::fs::create_dir_all(dir)?;
        let db = redb::Database::create(dir.join(REDB_FILE_NAME))?;

        let write_txn = db.begin_write()?;
        write_txn.open_table(DOCUMENTS)?;
        write_txn.open_table(DOCUMENTS_BY_UPDATED)?;
        write_txn.commit()?;

        tracing::debug!(path = %dir.display(), "document database opened");
        Ok(Self { db: Arc::new(db) })
    }

    /// Build a second handle onto the same redb instance.
    ///
    /// redb holds an exclusive file lock, so reopening the path from the same
    /// process would fail; share the handle instead.
    pub fn share(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
        }
    }
}

impl DocumentStore for Database {
    fn get(&self, id: &str) -> Result<Option<Document>, AppError> {
        let read_txn = self.db.begin_read()?;
        let documents = read_txn.open_table(DOCUMENTS)?;
        match documents.get(id)? {
            Some(value) => Ok(Some(deserialize_document(value.value())?)),
            None => Ok(None),
        }
    }

    fn create(&self, document: &Document) -> Result<(), AppError> {
        let encoded = bincode::serialize(document)?;
        let recency_key = reverse_timestamp_key(document.updated_at);

        let write_txn = self.db.begin_write()?;
        {
            let mut documents = write_txn.open_table(DOCUMENTS)?;
            let mut updated = write_txn.open_table(DOCUMENTS_BY_UPDATED)?;

            if documents.get(document.id.as_str())?.is_some() {
                return Err(AppError::StorageMessage(format!(
                    "Document id '{}' already exists",
                    document.id
                )));
            }

            documents.insert(document.id.as_str(), encoded.as_slice())?;
            updated.insert((recency_key, document.id.as_str()), ())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn put(&self, id: &str, patch: &DocumentPatch) -> Result<Document, AppError> {
        let write_txn = self.db.begin_write()?;
        let stored = {
            let mut documents = write_txn.open_table(DOCUMENTS)?;
            let mut updated = write_txn.open_table(DOCUMENTS_BY_UPDATED)?;

            let Some(old_guard) = documents.get(id)? else {
                return Err(AppError::NotFound);
            };
            let mut document = deserialize_document(old_guard.value())?;
            let old_recency_key = reverse_timestamp_key(document.updated_at);
            drop(old_guard);

            document.apply_patch(patch);
            let encoded = bincode::serialize(&document)?;
            let new_recency_key = reverse_timestamp_key(document.updated_at);

            documents.insert(id, encoded.as_slice())?;
            if old_recency_key != new_recency_key {
                let _ = updated.remove((old_recency_key, id))?;
            }
            updated.insert((new_recency_key, id), ())?;
            document
        };
        write_txn.commit()?;
        Ok(stored)
    }

    fn list_all(&self) -> Result<Vec<Document>, AppError> {
        let read_txn = self.db.begin_read()?;
        let updated_table = read_txn.open_table(DOCUMENTS_BY_UPDATED)?;
        let documents_table = read_txn.open_table(DOCUMENTS)?;

        let mut documents = Vec::new();
        for item in updated_table.iter()? {
            let (key, _) = item?;
            let (_, id) = key.value();
            let Some(guard) = documents_table.get(id)? else {
                continue;
            };
            documents.push(deserialize_document(guard.value())?);
        }
        Ok(documents)
    }

    fn delete(&self, id: &str) -> Result<bool, AppError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut documents = write_txn.open_table(DOCUMENTS)?;
            let mut updated = write_txn.open_table(DOCUMENTS_BY_UPDATED)?;

            let Some(old_guard) = documents.get(id)? else {
                return Ok(false);
            };
            let document = deserialize_document(old_guard.value())?;
            let recency_key = reverse_timestamp_key(document.updated_at);
            drop(old_guard);

            let _ = updated.remove((recency_key, id))?;
            let _ = documents.remove(id)?;
        }
        write_txn.commit()?;
        Ok(true)
    }
}
