//! Protocol types for the document store worker.

use hushpad_core::models::document::{Document, DocumentPatch, DocumentSummary};

/// Commands issued by the UI thread for the store worker to execute.
#[derive(Debug)]
pub enum StoreCmd {
    /// Fetch summaries of every document, most recently updated first.
    ListDocuments,
    /// Load a single document for mounting in the editor.
    GetDocument { id: String },
    /// Create a new document with the provided content.
    CreateDocument { content: String },
    /// Persist a content snapshot. `revision` is echoed back in the ack so the
    /// caller can tell whether newer local edits exist.
    SaveDocument {
        id: String,
        patch: DocumentPatch,
        revision: u64,
    },
    /// Delete a document by id.
    DeleteDocument { id: String },
}

/// Which request an [`StoreEvent::Error`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorSource {
    List,
    Create,
    Delete,
}

/// Events produced by the store worker and polled by the UI thread.
#[derive(Debug)]
pub enum StoreEvent {
    DocumentList { items: Vec<DocumentSummary> },
    DocumentLoaded { document: Document },
    DocumentCreated { document: Document },
    /// A save completed; `revision` is the one sent with the request.
    DocumentSaved { document: Document, revision: u64 },
    DocumentDeleted { id: String },
    /// The requested id does not exist (anymore).
    DocumentMissing { id: String },
    /// Loading an existing document failed.
    LoadFailed { id: String, message: String },
    /// The store rejected a save; `revision` is the one sent with the request.
    SaveFailed {
        id: String,
        revision: u64,
        message: String,
    },
    Error {
        source: StoreErrorSource,
        message: String,
    },
}
