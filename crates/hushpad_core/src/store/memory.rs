//! In-process document store for headless sessions and tests.

use super::DocumentStore;
use crate::{
    error::AppError,
    models::document::{Document, DocumentPatch},
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct Shared {
    documents: Mutex<HashMap<String, Document>>,
    fail_writes: AtomicBool,
    puts: AtomicUsize,
}

/// Map-backed [`DocumentStore`].
///
/// Clones share the same rows, so a test can keep one handle for inspection
/// while the backend worker owns another. Writes can be forced to fail to
/// exercise transient-failure paths.
#[derive(Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `create`/`put`/`delete` fail until cleared.
    pub fn set_fail_writes(&self, fail: bool) {
        self.shared.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of `put` calls attempted, including failed ones.
    pub fn put_count(&self) -> usize {
        self.shared.puts.load(Ordering::SeqCst)
    }

    fn rows(&self) -> Result<MutexGuard<'_, HashMap<String, Document>>, AppError> {
        self.shared
            .documents
            .lock()
            .map_err(|_| AppError::Unavailable("memory store lock poisoned".to_string()))
    }

    fn check_writable(&self) -> Result<(), AppError> {
        if self.shared.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Unavailable("writes are disabled".to_string()));
        }
        Ok(())
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, id: &str) -> Result<Option<Document>, AppError> {
        Ok(self.rows()?.get(id).cloned())
    }

    fn create(&self, document: &Document) -> Result<(), AppError> {
        self.check_writable()?;
        let mut rows = self.rows()?;
        if rows.contains_key(&document.id) {
            return Err(AppError::StorageMessage(format!(
                "Document id '{}' already exists",
                document.id
            )));
        }
        rows.insert(document.id.clone(), document.clone());
        Ok(())
    }

    fn put(&self, id: &str, patch: &DocumentPatch) -> Result<Document, AppError> {
        self.shared.puts.fetch_add(1, Ordering::SeqCst);
        self.check_writable()?;
        let mut rows = self.rows()?;
        let document = rows.get_mut(id).ok_or(AppError::NotFound)?;
        document.apply_patch(patch);
        Ok(document.clone())
    }

    fn list_all(&self) -> Result<Vec<Document>, AppError> {
        let mut documents: Vec<Document> = self.rows()?.values().cloned().collect();
        documents.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));
        Ok(documents)
    }

    fn delete(&self, id: &str) -> Result<bool, AppError> {
        self.check_writable()?;
        Ok(self.rows()?.remove(id).is_some())
    }
}
