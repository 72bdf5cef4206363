//! Store worker wiring.
//!
//! The editor thread never touches the database directly. It sends
//! [`StoreCmd`] values and polls [`StoreEvent`] replies each frame.

mod protocol;
mod worker;

pub use protocol::{StoreCmd, StoreErrorSource, StoreEvent};
pub use worker::{spawn_backend, BackendHandle, BackendShutdownError};
