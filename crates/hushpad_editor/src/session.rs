//! Editor session: wires one rendering surface to selection tracking, focus
//! dimming, typewriter scrolling and edit persistence.

use crate::backend::{BackendHandle, BackendShutdownError};
use crate::focus::FocusSynchronizer;
use crate::persistence::{EditPersistence, PersistenceError, SaveStatus};
use crate::selection::{SelectionSnapshot, SelectionTracker, TrackerStats};
use crate::surface::{RenderSurface, SurfaceEvent};
use crate::typewriter::{ScrollMode, TypewriterConfig, TypewriterController};
use crossbeam_channel::Receiver;
use hushpad_core::models::document::Document;
use hushpad_core::Config;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

/// Errors from document-level session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Pending edits could not be saved, so the current document stays.
    #[error("cannot leave the current document: {0}")]
    SwitchBlocked(#[source] PersistenceError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("document could not be opened: {0}")]
    OpenFailed(String),
    #[error(transparent)]
    Backend(#[from] BackendShutdownError),
}

/// Tunables for one session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    pub selection_throttle: Duration,
    pub auto_save_delay: Duration,
    pub save_flush_timeout: Duration,
    pub focus_dim_opacity: f32,
    pub typewriter: TypewriterConfig,
    pub focus_mode: bool,
    pub typewriter_mode: bool,
}

impl SessionOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            selection_throttle: config.selection_throttle_interval(),
            auto_save_delay: config.auto_save_delay(),
            save_flush_timeout: config.save_flush_timeout(),
            focus_dim_opacity: config.focus_dim_opacity,
            typewriter: TypewriterConfig {
                max_duration: config.typewriter_max_duration(),
                ..TypewriterConfig::default()
            },
            focus_mode: config.focus_mode,
            typewriter_mode: config.typewriter_mode,
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Single-threaded editor session.
///
/// The host forwards surface events through [`Self::handle_event`] and calls
/// [`Self::on_frame`] once per frame; neither blocks. Dropping the session
/// tears it down without saving; call [`Self::shutdown`] to flush first.
pub struct EditorSession<S: RenderSurface> {
    surface: S,
    tracker: SelectionTracker,
    focus: FocusSynchronizer,
    typewriter: TypewriterController,
    persistence: EditPersistence,
    torn_down: bool,
}

impl<S: RenderSurface> EditorSession<S> {
    pub fn new(surface: S, backend: BackendHandle, options: SessionOptions) -> Self {
        let mut session = Self {
            surface,
            tracker: SelectionTracker::new(options.selection_throttle),
            focus: FocusSynchronizer::new(options.focus_dim_opacity),
            typewriter: TypewriterController::new(options.typewriter),
            persistence: EditPersistence::new(
                backend,
                options.auto_save_delay,
                options.save_flush_timeout,
            ),
            torn_down: false,
        };
        session.set_typewriter_mode(options.typewriter_mode);
        session.set_focus_mode(options.focus_mode);
        session
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Direct access for driving the surface (typing, caret moves).
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn persistence(&self) -> &EditPersistence {
        &self.persistence
    }

    pub fn persistence_mut(&mut self) -> &mut EditPersistence {
        &mut self.persistence
    }

    pub fn focus(&self) -> &FocusSynchronizer {
        &self.focus
    }

    pub fn typewriter(&self) -> &TypewriterController {
        &self.typewriter
    }

    pub fn selection(&self) -> Option<&SelectionSnapshot> {
        self.tracker.last_snapshot()
    }

    pub fn selection_stats(&self) -> TrackerStats {
        self.tracker.stats()
    }

    pub fn subscribe_selection(&mut self) -> Receiver<SelectionSnapshot> {
        self.tracker.subscribe()
    }

    pub fn subscribe_save_status(&mut self) -> Receiver<SaveStatus> {
        self.persistence.subscribe_status()
    }

    pub fn save_status(&self) -> SaveStatus {
        self.persistence.status()
    }

    pub fn active_document(&self) -> Option<&Document> {
        self.persistence.document()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Route one surface notification.
    pub fn handle_event(&mut self, event: SurfaceEvent, now: Instant) {
        if self.torn_down {
            return;
        }
        match event {
            SurfaceEvent::SelectionChanged => {
                if let Some(snapshot) = self.tracker.on_selection_event(&self.surface, now) {
                    self.apply_selection(&snapshot);
                }
            }
            SurfaceEvent::ContentChanged { content } => {
                self.tracker.invalidate();
                self.persistence.on_content_changed(content, now);
            }
            SurfaceEvent::CursorMoved { rect, instant } => {
                let mode = if instant {
                    ScrollMode::Instant
                } else {
                    ScrollMode::Smooth
                };
                self.typewriter
                    .on_cursor_moved(&mut self.surface, rect, mode, now);
            }
            SurfaceEvent::Scrolled => self.typewriter.on_user_scroll(),
        }
    }

    pub fn handle_events<I>(&mut self, events: I, now: Instant)
    where
        I: IntoIterator<Item = SurfaceEvent>,
    {
        for event in events {
            self.handle_event(event, now);
        }
    }

    /// Frame hook: trailing selection run, one animation step, store events
    /// and autosave.
    pub fn on_frame(&mut self, now: Instant) {
        if self.torn_down {
            return;
        }
        if let Some(snapshot) = self.tracker.on_frame(&self.surface, now) {
            self.apply_selection(&snapshot);
        }
        self.typewriter.on_frame(&mut self.surface, now);
        self.persistence.poll(now);
        if let Some(document) = self.persistence.take_opened() {
            self.mount_document(document);
        }
    }

    fn apply_selection(&mut self, snapshot: &SelectionSnapshot) {
        self.focus
            .on_block_index_changed(&mut self.surface, snapshot.active_block_index);
    }

    pub fn set_focus_mode(&mut self, enabled: bool) {
        if self.torn_down {
            return;
        }
        if !enabled {
            self.focus.disable(&mut self.surface);
            return;
        }
        if self.focus.is_enabled() {
            return;
        }
        // Seed the index first so enabling installs the final rule in one go.
        let snapshot = self.tracker.refresh(&self.surface);
        self.focus
            .on_block_index_changed(&mut self.surface, snapshot.active_block_index);
        self.focus.enable(&mut self.surface);
        info!(active_block_index = ?snapshot.active_block_index, "focus mode on");
    }

    pub fn set_typewriter_mode(&mut self, enabled: bool) {
        if enabled {
            self.typewriter.enable();
        } else {
            self.typewriter.disable();
        }
    }

    /// Write pending edits now, bypassing the autosave delay.
    pub fn save_now(&mut self) -> Result<(), PersistenceError> {
        self.persistence.flush_now()
    }

    /// Start switching to document `id`.
    ///
    /// Pending edits are flushed first; when that fails the current document
    /// stays mounted and nothing else changes. A document that was deleted
    /// from the store elsewhere is left behind with its unsaved edits. The
    /// new document mounts on a later frame (or via
    /// [`Self::wait_for_document`]).
    pub fn open_document(&mut self, id: &str) -> Result<(), SessionError> {
        self.leave_current_document()?;
        self.persistence.request_open(id);
        Ok(())
    }

    /// Create a document with `content` and switch to it.
    pub fn create_document(&mut self, content: &str) -> Result<(), SessionError> {
        self.leave_current_document()?;
        self.persistence.request_create(content);
        Ok(())
    }

    fn leave_current_document(&mut self) -> Result<(), SessionError> {
        match self.persistence.flush_now() {
            Ok(()) => {}
            Err(PersistenceError::DocumentMissing(id)) => {
                // Nothing left to save into; the edits go with the row.
                warn!(id = %id, "leaving a document deleted elsewhere; dropping unsaved edits");
            }
            Err(err) => return Err(SessionError::SwitchBlocked(err)),
        }
        self.cancel_outstanding();
        self.surface.destroy();
        self.focus.clear_index(&mut self.surface);
        self.persistence.close();
        Ok(())
    }

    /// Switch to an already-loaded document without a store round trip.
    pub fn attach_document(&mut self, document: Document) -> Result<(), SessionError> {
        self.leave_current_document()?;
        self.persistence.open(document.clone());
        self.mount_document(document);
        Ok(())
    }

    /// Block until a requested document is mounted.
    pub fn wait_for_document(&mut self, timeout: Duration) -> Result<(), SessionError> {
        if !self.persistence.wait_for_open(timeout)? {
            let message = self
                .persistence
                .last_error()
                .unwrap_or("no document was requested")
                .to_string();
            return Err(SessionError::OpenFailed(message));
        }
        if let Some(document) = self.persistence.take_opened() {
            self.mount_document(document);
        }
        Ok(())
    }

    fn mount_document(&mut self, document: Document) {
        if let Err(err) = self.surface.mount(&document.id, &document.content) {
            warn!(id = %document.id, error = %err, "surface mount failed");
            return;
        }
        self.tracker.reset();
        self.typewriter.reset();
        self.focus.clear_index(&mut self.surface);
        let snapshot = self.tracker.refresh(&self.surface);
        self.apply_selection(&snapshot);
        info!(id = %document.id, title = %document.title, "document mounted");
    }

    fn cancel_outstanding(&mut self) {
        self.tracker.cancel();
        self.typewriter.cancel();
        self.persistence.cancel_pending();
    }

    /// Cancel scheduled work, then release the style rule and the surface.
    ///
    /// Unsaved edits are dropped. Safe to call repeatedly.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.cancel_outstanding();
        self.focus.teardown(&mut self.surface);
        self.surface.destroy();
        if self.persistence.status() != SaveStatus::Saved {
            warn!(status = ?self.persistence.status(), "session torn down with unsaved edits");
        }
    }

    /// Flush, tear down, and stop the store worker.
    ///
    /// Teardown and worker shutdown happen even when the flush fails; the
    /// flush error is returned afterwards.
    pub fn shutdown(&mut self, timeout: Duration) -> Result<(), SessionError> {
        let flushed = if self.torn_down {
            Ok(())
        } else {
            self.persistence.flush_now()
        };
        self.teardown();
        self.persistence.shutdown_backend(timeout)?;
        flushed?;
        Ok(())
    }
}

impl<S: RenderSurface> Drop for EditorSession<S> {
    fn drop(&mut self) {
        self.teardown();
    }
}
