//! Core domain library for Hushpad (config, documents, storage).

/// Configuration loading and defaults.
pub mod config;
/// Shared default values.
pub mod constants;
/// Application error types (storage/domain).
pub mod error;
/// Data models for persisted documents.
pub mod models;
/// Document store contract and its implementations.
pub mod store;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use constants::*;
pub use error::AppError;
pub use store::{Database, DocumentStore, MemoryStore};
