//! Distraction-reduction layer for a live-preview markdown editor.
//!
//! Tracks the caret's block and inline formatting, dims every block but the
//! active one, keeps the caret vertically centered, and writes edits back to
//! the document store after a quiet period. Everything runs on the caller's
//! thread except store I/O, which goes through a worker.

/// Store worker and its command/event protocol.
pub mod backend;
/// Focus-mode dimming rule.
pub mod focus;
/// In-memory rendering surface.
pub mod headless;
/// Debounced document write-back.
pub mod persistence;
/// Throttle/debounce primitives.
pub mod rate_limit;
/// Active block and formatting tracking.
pub mod selection;
/// Session wiring all components to one surface.
pub mod session;
/// Contracts with the rendering surface.
pub mod surface;
/// Caret centering.
pub mod typewriter;

pub use backend::{spawn_backend, BackendHandle, StoreCmd, StoreEvent};
pub use focus::{FocusSynchronizer, PositionalRule};
pub use headless::HeadlessSurface;
pub use persistence::{EditPersistence, PersistenceError, SaveStatus};
pub use selection::{SelectionSnapshot, SelectionTracker};
pub use session::{EditorSession, SessionError, SessionOptions};
pub use surface::{InlineFormat, RenderSurface, SurfaceEvent};
pub use typewriter::{ScrollMode, TypewriterConfig, TypewriterController};
