//! Shared constants used across Hushpad crates.

/// Default autosave debounce in milliseconds.
pub const DEFAULT_AUTO_SAVE_INTERVAL_MS: u64 = 1_000;

/// Default minimum spacing between selection recomputations.
pub const DEFAULT_SELECTION_THROTTLE_MS: u64 = 50;

/// Hard cap on a single typewriter scroll animation.
pub const DEFAULT_TYPEWRITER_MAX_DURATION_MS: u64 = 500;

/// Opacity applied to every block except the active one in focus mode.
pub const DEFAULT_FOCUS_DIM_OPACITY: f32 = 0.3;

/// Upper bound on how long an explicit flush waits for the store.
pub const DEFAULT_SAVE_FLUSH_TIMEOUT_MS: u64 = 2_000;

/// Longest derived document title, in characters.
pub const MAX_TITLE_CHARS: usize = 80;

/// Title used when a document has no non-empty line.
pub const UNTITLED_TITLE: &str = "Untitled";

/// Directory under the cache root used when `DB_PATH` is unset.
pub const DEFAULT_DB_DIR_NAME: &str = "hushpad";
