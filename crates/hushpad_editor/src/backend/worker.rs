//! Background worker thread for document store access.

use super::{StoreCmd, StoreErrorSource, StoreEvent};
use crossbeam_channel::{unbounded, Receiver, Sender};
use hushpad_core::{
    models::document::{Document, DocumentPatch, DocumentSummary},
    AppError, DocumentStore,
};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info};

/// Failure while stopping the worker thread.
#[derive(Debug, Error)]
pub enum BackendShutdownError {
    #[error("store worker did not stop within {0:?}")]
    Timeout(Duration),
    #[error("store worker panicked")]
    Panicked,
}

/// Handle for sending commands to, and receiving events from, the store worker.
pub struct BackendHandle {
    pub cmd_tx: Sender<StoreCmd>,
    pub evt_rx: Receiver<StoreEvent>,
    worker: Option<JoinHandle<()>>,
}

impl BackendHandle {
    /// Wrap raw channels without a worker thread.
    ///
    /// Tests use this to script backend replies by hand.
    pub fn from_test_channels(cmd_tx: Sender<StoreCmd>, evt_rx: Receiver<StoreEvent>) -> Self {
        Self {
            cmd_tx,
            evt_rx,
            worker: None,
        }
    }

    /// Close the command channel and wait for the worker to drain and exit.
    ///
    /// Commands already queued are still executed. Calling this again after
    /// a successful shutdown is a no-op.
    ///
    /// # Errors
    /// Returns [`BackendShutdownError::Timeout`] when the worker is still
    /// running after `timeout`, or [`BackendShutdownError::Panicked`] when it
    /// died abnormally.
    pub fn shutdown(&mut self, timeout: Duration) -> Result<(), BackendShutdownError> {
        // Swap in a sender whose receiver is already gone; dropping the real
        // one disconnects the worker's command loop.
        let (closed_tx, _) = unbounded();
        drop(std::mem::replace(&mut self.cmd_tx, closed_tx));
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };

        let deadline = Instant::now() + timeout;
        while !worker.is_finished() {
            if Instant::now() >= deadline {
                self.worker = Some(worker);
                return Err(BackendShutdownError::Timeout(timeout));
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        worker.join().map_err(|_| BackendShutdownError::Panicked)
    }
}

fn send_error(evt_tx: &Sender<StoreEvent>, source: StoreErrorSource, message: String) {
    let _ = evt_tx.send(StoreEvent::Error { source, message });
}

fn handle_list<S: DocumentStore>(store: &S, evt_tx: &Sender<StoreEvent>) {
    match store.list_all() {
        Ok(documents) => {
            let items: Vec<DocumentSummary> = documents.iter().map(DocumentSummary::from).collect();
            let _ = evt_tx.send(StoreEvent::DocumentList { items });
        }
        Err(err) => {
            error!("backend list failed: {}", err);
            send_error(evt_tx, StoreErrorSource::List, format!("List failed: {}", err));
        }
    }
}

fn handle_get<S: DocumentStore>(store: &S, evt_tx: &Sender<StoreEvent>, id: String) {
    match store.get(&id) {
        Ok(Some(document)) => {
            let _ = evt_tx.send(StoreEvent::DocumentLoaded { document });
        }
        Ok(None) => {
            let _ = evt_tx.send(StoreEvent::DocumentMissing { id });
        }
        Err(err) => {
            error!("backend get failed: {}", err);
            let _ = evt_tx.send(StoreEvent::LoadFailed {
                id,
                message: format!("Get failed: {}", err),
            });
        }
    }
}

fn handle_create<S: DocumentStore>(store: &S, evt_tx: &Sender<StoreEvent>, content: String) {
    let document = Document::new(content);
    match store.create(&document) {
        Ok(()) => {
            info!(id = %document.id, "document created");
            let _ = evt_tx.send(StoreEvent::DocumentCreated { document });
        }
        Err(err) => {
            error!("backend create failed: {}", err);
            send_error(evt_tx, StoreErrorSource::Create, format!("Create failed: {}", err));
        }
    }
}

fn handle_save<S: DocumentStore>(
    store: &S,
    evt_tx: &Sender<StoreEvent>,
    id: String,
    patch: DocumentPatch,
    revision: u64,
) {
    match store.put(&id, &patch) {
        Ok(document) => {
            debug!(id = %id, revision, words = document.word_count, "document saved");
            let _ = evt_tx.send(StoreEvent::DocumentSaved { document, revision });
        }
        Err(AppError::NotFound) => {
            let _ = evt_tx.send(StoreEvent::DocumentMissing { id });
        }
        Err(err) => {
            error!("backend save failed: {}", err);
            let _ = evt_tx.send(StoreEvent::SaveFailed {
                id,
                revision,
                message: format!("Save failed: {}", err),
            });
        }
    }
}

fn handle_delete<S: DocumentStore>(store: &S, evt_tx: &Sender<StoreEvent>, id: String) {
    match store.delete(&id) {
        Ok(true) => {
            info!(id = %id, "document deleted");
            let _ = evt_tx.send(StoreEvent::DocumentDeleted { id });
        }
        Ok(false) => {
            let _ = evt_tx.send(StoreEvent::DocumentMissing { id });
        }
        Err(err) => {
            error!("backend delete failed: {}", err);
            send_error(evt_tx, StoreErrorSource::Delete, format!("Delete failed: {}", err));
        }
    }
}

/// Spawn the worker thread that performs blocking store access.
///
/// All I/O stays off the editor thread; the worker replies with
/// [`StoreEvent`] values that are polled each frame. Commands are executed in
/// the order they were sent. The worker exits once every command sender is
/// dropped.
///
/// # Returns
/// A [`BackendHandle`] containing the command sender and event receiver.
///
/// # Panics
/// Panics if the worker thread cannot be spawned.
pub fn spawn_backend<S: DocumentStore>(store: S) -> BackendHandle {
    let (cmd_tx, cmd_rx) = unbounded();
    let (evt_tx, evt_rx) = unbounded();

    let worker = thread::Builder::new()
        .name("hushpad-store".to_string())
        .spawn(move || {
            for cmd in cmd_rx.iter() {
                match cmd {
                    StoreCmd::ListDocuments => handle_list(&store, &evt_tx),
                    StoreCmd::GetDocument { id } => handle_get(&store, &evt_tx, id),
                    StoreCmd::CreateDocument { content } => {
                        handle_create(&store, &evt_tx, content)
                    }
                    StoreCmd::SaveDocument {
                        id,
                        patch,
                        revision,
                    } => handle_save(&store, &evt_tx, id, patch, revision),
                    StoreCmd::DeleteDocument { id } => handle_delete(&store, &evt_tx, id),
                }
            }
            debug!("store worker exiting");
        })
        .expect("failed to spawn store worker");

    BackendHandle {
        cmd_tx,
        evt_rx,
        worker: Some(worker),
    }
}
