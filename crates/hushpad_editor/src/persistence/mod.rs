//! Edit persistence: debounced write-back of the active document.
//!
//! Edits update the in-memory document immediately and arm a quiet-period
//! debounce. When the debounce fires and no save is in flight, one snapshot
//! is sent to the store worker tagged with the local revision. The ack's
//! revision decides whether the document is clean or still has newer edits.

use crate::backend::{BackendHandle, BackendShutdownError, StoreCmd, StoreErrorSource, StoreEvent};
use crate::rate_limit::Debounce;
use chrono::Utc;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use hushpad_core::models::document::{count_words, derive_title, Document, DocumentSummary};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Save state of the active document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStatus {
    Saved,
    Unsaved,
    Saving,
}

impl SaveStatus {
    /// Status-bar label.
    pub fn label(&self) -> &'static str {
        match self {
            SaveStatus::Saved => "Saved",
            SaveStatus::Unsaved => "Unsaved",
            SaveStatus::Saving => "Saving...",
        }
    }
}

/// Failure of an explicit flush.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    #[error("save failed: {0}")]
    SaveFailed(String),
    #[error("save did not complete within {0:?}")]
    Timeout(Duration),
    #[error("store worker is unavailable")]
    BackendUnavailable,
    /// The active document was removed from the store behind our back.
    #[error("document {0} no longer exists in the store")]
    DocumentMissing(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PendingOpen {
    Load(String),
    Create,
}

const FLUSH_POLL_SLICE: Duration = Duration::from_millis(25);

/// Debounced persistence pipeline for one active document at a time.
pub struct EditPersistence {
    backend: BackendHandle,
    debounce: Debounce,
    flush_timeout: Duration,
    document: Option<Document>,
    status: SaveStatus,
    revision: u64,
    save_in_flight: bool,
    save_request_revision: Option<u64>,
    documents: Vec<DocumentSummary>,
    pending_open: Option<PendingOpen>,
    opened: Option<Document>,
    last_error: Option<String>,
    status_subscribers: Vec<Sender<SaveStatus>>,
    writes_dispatched: u64,
    backend_lost: bool,
    active_missing: bool,
}

impl EditPersistence {
    pub fn new(backend: BackendHandle, autosave_delay: Duration, flush_timeout: Duration) -> Self {
        Self {
            backend,
            debounce: Debounce::new(autosave_delay),
            flush_timeout,
            document: None,
            status: SaveStatus::Saved,
            revision: 0,
            save_in_flight: false,
            save_request_revision: None,
            documents: Vec::new(),
            pending_open: None,
            opened: None,
            last_error: None,
            status_subscribers: Vec::new(),
            writes_dispatched: 0,
            backend_lost: false,
            active_missing: false,
        }
    }

    pub fn status(&self) -> SaveStatus {
        self.status
    }

    /// In-memory view of the active document, including unsaved edits.
    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn active_id(&self) -> Option<&str> {
        self.document.as_ref().map(|doc| doc.id.as_str())
    }

    /// Cached document list, most recently updated first.
    pub fn documents(&self) -> &[DocumentSummary] {
        &self.documents
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_save_in_flight(&self) -> bool {
        self.save_in_flight
    }

    pub fn is_open_pending(&self) -> bool {
        self.pending_open.is_some()
    }

    /// `true` once the store worker's event channel has disconnected.
    pub fn is_backend_lost(&self) -> bool {
        self.backend_lost
    }

    /// `true` when the store reported the active document as gone.
    pub fn is_active_missing(&self) -> bool {
        self.active_missing
    }

    /// Number of save commands sent to the store worker.
    pub fn writes_dispatched(&self) -> u64 {
        self.writes_dispatched
    }

    /// Receive every status transition.
    pub fn subscribe_status(&mut self) -> Receiver<SaveStatus> {
        let (tx, rx) = unbounded();
        self.status_subscribers.push(tx);
        rx
    }

    fn set_status(&mut self, status: SaveStatus) {
        if self.status == status {
            return;
        }
        debug!(from = ?self.status, to = ?status, "save status changed");
        self.status = status;
        self.status_subscribers.retain(|tx| tx.send(status).is_ok());
    }

    /// Make `document` the active document, discarding pipeline state.
    pub fn open(&mut self, document: Document) {
        self.debounce.cancel();
        self.save_in_flight = false;
        self.save_request_revision = None;
        self.revision = 0;
        self.last_error = None;
        self.active_missing = false;
        self.upsert_summary(&document);
        self.document = Some(document);
        self.set_status(SaveStatus::Saved);
    }

    /// Drop the active document without saving.
    pub fn close(&mut self) {
        self.debounce.cancel();
        self.document = None;
        self.save_in_flight = false;
        self.save_request_revision = None;
        self.active_missing = false;
        self.set_status(SaveStatus::Saved);
    }

    /// Drop the pending autosave. Safe to call repeatedly.
    pub fn cancel_pending(&mut self) {
        self.debounce.cancel();
    }

    /// Document delivered by a completed open/create request.
    pub fn take_opened(&mut self) -> Option<Document> {
        self.opened.take()
    }

    pub fn request_list(&mut self) {
        self.send(StoreCmd::ListDocuments);
    }

    /// Ask the worker for `id`; the active document switches once it arrives.
    pub fn request_open(&mut self, id: &str) {
        self.pending_open = Some(PendingOpen::Load(id.to_string()));
        if !self.send(StoreCmd::GetDocument { id: id.to_string() }) {
            self.pending_open = None;
        }
    }

    /// Create a document and make it active once the worker confirms.
    pub fn request_create(&mut self, content: &str) {
        self.pending_open = Some(PendingOpen::Create);
        let sent = self.send(StoreCmd::CreateDocument {
            content: content.to_string(),
        });
        if !sent {
            self.pending_open = None;
        }
    }

    pub fn request_delete(&mut self, id: &str) {
        self.send(StoreCmd::DeleteDocument { id: id.to_string() });
    }

    fn send(&mut self, cmd: StoreCmd) -> bool {
        if self.backend.cmd_tx.send(cmd).is_err() {
            warn!("store worker is gone; command dropped");
            self.last_error = Some("Store worker is unavailable".to_string());
            return false;
        }
        true
    }

    /// Record an edit to the active document.
    ///
    /// Title and word count are refreshed right away so the UI never waits on
    /// the store. Edits made while a save is in flight keep the status at
    /// `Saving`; the ack decides what comes next.
    pub fn on_content_changed(&mut self, content: String, now: Instant) {
        let Some(document) = self.document.as_mut() else {
            debug!("content change without an active document");
            return;
        };
        if document.content == content {
            return;
        }
        document.title = derive_title(&content);
        document.word_count = count_words(&content);
        document.content = content;
        self.revision += 1;
        self.debounce.touch(now);
        if self.status != SaveStatus::Saving {
            self.set_status(SaveStatus::Unsaved);
        }
    }

    /// Frame hook: drain worker events, then autosave if the debounce is due.
    pub fn poll(&mut self, now: Instant) {
        loop {
            match self.backend.evt_rx.try_recv() {
                Ok(event) => self.apply_event(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.on_backend_lost();
                    break;
                }
            }
        }
        self.maybe_autosave(now);
    }

    /// No ack can arrive anymore: an in-flight save counts as failed.
    fn on_backend_lost(&mut self) {
        if !self.backend_lost {
            warn!(
                save_in_flight = self.save_in_flight,
                "store worker disconnected"
            );
        }
        self.backend_lost = true;
        self.pending_open = None;
        self.last_error = Some("Store worker is unavailable".to_string());
        if self.save_in_flight {
            self.save_in_flight = false;
            self.save_request_revision = None;
            self.set_status(SaveStatus::Unsaved);
        }
    }

    fn maybe_autosave(&mut self, now: Instant) {
        if self.save_in_flight || self.status != SaveStatus::Unsaved {
            return;
        }
        if self.backend_lost || self.active_missing {
            return;
        }
        if !self.debounce.poll(now) {
            return;
        }
        self.dispatch_save();
    }

    fn dispatch_save(&mut self) -> bool {
        let Some(document) = self.document.as_ref() else {
            return false;
        };
        let id = document.id.clone();
        let patch = document.content_patch(Utc::now());
        let revision = self.revision;
        if !self.send(StoreCmd::SaveDocument {
            id: id.clone(),
            patch,
            revision,
        }) {
            self.save_in_flight = false;
            self.set_status(SaveStatus::Unsaved);
            return false;
        }
        self.save_in_flight = true;
        self.save_request_revision = Some(revision);
        self.writes_dispatched += 1;
        self.set_status(SaveStatus::Saving);
        info!(id = %id, revision, "save dispatched");
        true
    }

    fn upsert_summary(&mut self, document: &Document) {
        let summary = DocumentSummary::from(document);
        self.documents.retain(|item| item.id != summary.id);
        self.documents.insert(0, summary);
    }

    fn is_active(&self, id: &str) -> bool {
        self.active_id() == Some(id)
    }

    /// Apply one worker event.
    pub fn apply_event(&mut self, event: StoreEvent) {
        match event {
            StoreEvent::DocumentList { items } => {
                self.documents = items;
            }
            StoreEvent::DocumentLoaded { document } => {
                if self.pending_open == Some(PendingOpen::Load(document.id.clone())) {
                    self.pending_open = None;
                    self.open(document.clone());
                    self.opened = Some(document);
                } else {
                    debug!(id = %document.id, "ignoring stale load");
                }
            }
            StoreEvent::DocumentCreated { document } => {
                self.upsert_summary(&document);
                if self.pending_open == Some(PendingOpen::Create) {
                    self.pending_open = None;
                    self.open(document.clone());
                    self.opened = Some(document);
                }
            }
            StoreEvent::DocumentSaved { document, revision } => {
                self.upsert_summary(&document);
                if !self.is_active(&document.id) || !self.save_in_flight {
                    return;
                }
                self.save_in_flight = false;
                let requested = self.save_request_revision.take();
                if let Some(active) = self.document.as_mut() {
                    active.created_at = document.created_at;
                    active.updated_at = document.updated_at;
                }
                if requested.unwrap_or(revision) != self.revision {
                    // The debounce armed by those edits schedules the next save.
                    self.set_status(SaveStatus::Unsaved);
                } else {
                    self.last_error = None;
                    self.set_status(SaveStatus::Saved);
                }
            }
            StoreEvent::DocumentDeleted { id } => {
                self.documents.retain(|item| item.id != id);
                if self.is_active(&id) {
                    info!(id = %id, "active document deleted");
                    self.close();
                }
            }
            StoreEvent::DocumentMissing { id } => {
                self.documents.retain(|item| item.id != id);
                if self.pending_open == Some(PendingOpen::Load(id.clone())) {
                    self.pending_open = None;
                    self.last_error = Some(format!("Document '{}' not found", id));
                }
                if !self.is_active(&id) {
                    return;
                }
                warn!(id = %id, "active document no longer exists");
                self.active_missing = true;
                self.last_error = Some(format!("Document '{}' no longer exists", id));
                if self.save_in_flight {
                    self.save_in_flight = false;
                    self.save_request_revision = None;
                    self.set_status(SaveStatus::Unsaved);
                }
            }
            StoreEvent::LoadFailed { id, message } => {
                if self.pending_open == Some(PendingOpen::Load(id.clone())) {
                    self.pending_open = None;
                }
                warn!(id = %id, "document load failed: {}", message);
                self.last_error = Some(message);
            }
            StoreEvent::SaveFailed {
                id,
                revision,
                message,
            } => {
                warn!(id = %id, revision, "save failed: {}", message);
                let current = self.is_active(&id)
                    && self.save_in_flight
                    && self.save_request_revision == Some(revision);
                if !current {
                    debug!(id = %id, revision, "ignoring failure of a superseded save");
                    return;
                }
                self.save_in_flight = false;
                self.save_request_revision = None;
                self.set_status(SaveStatus::Unsaved);
                self.last_error = Some(message);
            }
            StoreEvent::Error { source, message } => {
                if source == StoreErrorSource::Create
                    && self.pending_open == Some(PendingOpen::Create)
                {
                    self.pending_open = None;
                }
                warn!(?source, "store request failed: {}", message);
                self.last_error = Some(message);
            }
        }
    }

    /// Persist the active document now, waiting for the ack.
    ///
    /// Skips the debounce. An in-flight save is awaited first; if edits landed
    /// after it, one more save is sent for the latest revision.
    ///
    /// # Errors
    /// Returns [`PersistenceError::SaveFailed`] when the store rejected the
    /// write, [`PersistenceError::Timeout`] when no ack arrived in time,
    /// [`PersistenceError::BackendUnavailable`] when the worker is gone, and
    /// [`PersistenceError::DocumentMissing`] when the row was deleted
    /// elsewhere.
    pub fn flush_now(&mut self) -> Result<(), PersistenceError> {
        self.debounce.cancel();
        let deadline = Instant::now() + self.flush_timeout;
        let mut dispatched = false;

        loop {
            if !self.save_in_flight {
                let Some(id) = self.active_id() else {
                    return Ok(());
                };
                if self.status != SaveStatus::Unsaved {
                    return Ok(());
                }
                if self.active_missing {
                    return Err(PersistenceError::DocumentMissing(id.to_string()));
                }
                if dispatched {
                    // Our own latest-revision save came back unsuccessful.
                    return Err(PersistenceError::SaveFailed(
                        self.last_error
                            .clone()
                            .unwrap_or_else(|| "unknown error".to_string()),
                    ));
                }
                if self.backend_lost || !self.dispatch_save() {
                    return Err(PersistenceError::BackendUnavailable);
                }
                dispatched = true;
            }

            let wait_for = deadline
                .saturating_duration_since(Instant::now())
                .min(FLUSH_POLL_SLICE);
            if wait_for.is_zero() {
                warn!(
                    timeout_ms = self.flush_timeout.as_millis() as u64,
                    "flush timed out waiting for save ack"
                );
                return Err(PersistenceError::Timeout(self.flush_timeout));
            }
            match self.backend.evt_rx.recv_timeout(wait_for) {
                Ok(event) => self.apply_event(event),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    self.on_backend_lost();
                    return Err(PersistenceError::BackendUnavailable);
                }
            }
        }
    }

    /// Block until a pending open/create request resolves.
    ///
    /// # Returns
    /// `true` when a document was opened, `false` when the request failed
    /// (see [`Self::last_error`]) or nothing was pending.
    ///
    /// # Errors
    /// Returns [`PersistenceError::Timeout`] when the worker did not answer
    /// within `timeout`, [`PersistenceError::BackendUnavailable`] when it is
    /// gone.
    pub fn wait_for_open(&mut self, timeout: Duration) -> Result<bool, PersistenceError> {
        let deadline = Instant::now() + timeout;
        while self.pending_open.is_some() {
            let wait_for = deadline.saturating_duration_since(Instant::now());
            if wait_for.is_zero() {
                return Err(PersistenceError::Timeout(timeout));
            }
            match self.backend.evt_rx.recv_timeout(wait_for) {
                Ok(event) => self.apply_event(event),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    self.on_backend_lost();
                    return Err(PersistenceError::BackendUnavailable);
                }
            }
        }
        Ok(self.opened.is_some())
    }

    /// Stop the store worker after it drains queued commands.
    pub fn shutdown_backend(&mut self, timeout: Duration) -> Result<(), BackendShutdownError> {
        self.backend.shutdown(timeout)
    }
}

#[cfg(test)]
mod tests;
