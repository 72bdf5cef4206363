//! Shared test-only helpers for hushpad_core.

use crate::Database;
use std::sync::{Mutex, OnceLock};
use tempfile::TempDir;

/// Creates an isolated temporary database and returns it with the temp dir.
///
/// Keep the [`TempDir`] alive for the full test to preserve the backing files.
///
/// # Panics
/// Panics if temp-dir creation or database initialization fails.
pub(crate) fn setup_temp_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("temp dir");
    let db_path = temp_dir.path().join("db");
    let db = Database::new(db_path.to_str().expect("db path")).expect("db");
    (db, temp_dir)
}

/// Process-wide lock serializing environment mutation across test threads.
pub(crate) fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

/// Applies a set of environment overrides and restores every touched key on drop.
#[derive(Default)]
pub(crate) struct EnvOverrides {
    previous: Vec<(String, Option<String>)>,
}

impl EnvOverrides {
    fn remember(&mut self, key: &str) {
        if self.previous.iter().all(|(known, _)| known != key) {
            self.previous.push((key.to_string(), std::env::var(key).ok()));
        }
    }

    pub(crate) fn set(mut self, key: &str, value: &str) -> Self {
        self.remember(key);
        write_env(key, Some(value));
        self
    }

    pub(crate) fn remove(mut self, key: &str) -> Self {
        self.remember(key);
        write_env(key, None);
        self
    }
}

impl Drop for EnvOverrides {
    fn drop(&mut self) {
        for (key, previous) in self.previous.drain(..).rev() {
            write_env(&key, previous.as_deref());
        }
    }
}

#[allow(unused_unsafe)]
fn write_env(key: &str, value: Option<&str>) {
    // SAFETY: callers hold `env_lock` so no other test thread reads the environment concurrently.
    unsafe {
        match value {
            Some(value) => std::env::set_var(key, value),
            None => std::env::remove_var(key),
        }
    }
}
