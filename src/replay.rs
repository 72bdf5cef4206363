//! Type a text file into a headless editor session on a simulated clock.

use anyhow::{anyhow, Context, Result};
use hushpad_core::DocumentStore;
use hushpad_editor::{spawn_backend, EditorSession, HeadlessSurface, SaveStatus, SessionOptions};
use std::time::{Duration, Instant};
use tracing::debug;

pub const DEFAULT_CHARS_PER_SECOND: u32 = 40;

#[derive(Debug, Clone)]
pub struct ReplayOptions {
    /// Append to this document instead of creating a new one.
    pub id: Option<String>,
    pub focus: bool,
    pub typewriter: bool,
    pub chars_per_second: u32,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            id: None,
            focus: false,
            typewriter: false,
            chars_per_second: DEFAULT_CHARS_PER_SECOND,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplayReport {
    pub document_id: String,
    pub characters: usize,
    /// Save-status changes, stamped with simulated time since the first key.
    pub transitions: Vec<(Duration, SaveStatus)>,
    pub selection_runs: u64,
    pub word_count: usize,
}

fn keystroke_interval(chars_per_second: u32) -> Duration {
    Duration::from_secs(1) / chars_per_second.max(1)
}

/// Replay `text` keystroke by keystroke, wait for the autosave to land, then
/// shut the session down.
pub fn replay<S: DocumentStore>(
    store: S,
    text: &str,
    mut session_options: SessionOptions,
    options: &ReplayOptions,
) -> Result<ReplayReport> {
    session_options.focus_mode = options.focus;
    session_options.typewriter_mode = options.typewriter;
    let wait = session_options.save_flush_timeout;
    let quiet_period = session_options.auto_save_delay;

    let mut session = EditorSession::new(
        HeadlessSurface::default(),
        spawn_backend(store),
        session_options,
    );
    let statuses = session.subscribe_save_status();
    match options.id.as_deref() {
        Some(id) => session.open_document(id)?,
        None => session.create_document("")?,
    }
    session
        .wait_for_document(wait)
        .context("document did not open")?;
    let document_id = session
        .active_document()
        .map(|document| document.id.clone())
        .ok_or_else(|| anyhow!("no active document after open"))?;

    let start = Instant::now();
    let step = keystroke_interval(options.chars_per_second);
    let mut now = start;
    let mut transitions = Vec::new();
    let mut characters = 0;
    for ch in text.chars() {
        let mut buf = [0u8; 4];
        let events = session.surface_mut().insert_text(ch.encode_utf8(&mut buf))?;
        session.handle_events(events, now);
        session.on_frame(now);
        transitions.extend(statuses.try_iter().map(|status| (now - start, status)));
        characters += 1;
        now += step;
    }

    // Let the debounce expire, then give the worker real time to ack.
    let quiet = now + quiet_period;
    let deadline = Instant::now() + wait;
    while session.save_status() != SaveStatus::Saved && Instant::now() < deadline {
        session.on_frame(quiet);
        transitions.extend(statuses.try_iter().map(|status| (quiet - start, status)));
        std::thread::sleep(Duration::from_millis(5));
    }
    debug!(status = ?session.save_status(), "replay typing finished");

    let selection_runs = session.selection_stats().total_runs();
    let word_count = session
        .active_document()
        .map(|document| document.word_count)
        .unwrap_or_default();
    session.shutdown(wait)?;
    transitions.extend(statuses.try_iter().map(|status| (quiet - start, status)));

    Ok(ReplayReport {
        document_id,
        characters,
        transitions,
        selection_runs,
        word_count,
    })
}
