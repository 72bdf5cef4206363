//! Configuration loading from environment variables.

use crate::constants::{
    DEFAULT_AUTO_SAVE_INTERVAL_MS, DEFAULT_DB_DIR_NAME, DEFAULT_FOCUS_DIM_OPACITY,
    DEFAULT_SAVE_FLUSH_TIMEOUT_MS, DEFAULT_SELECTION_THROTTLE_MS,
    DEFAULT_TYPEWRITER_MAX_DURATION_MS,
};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Runtime configuration for Hushpad.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub db_path: String,
    /// Quiet period before buffered edits are written, in milliseconds.
    pub auto_save_interval: u64,
    /// Minimum spacing between selection recomputations, in milliseconds.
    pub selection_throttle: u64,
    /// Hard cap on one typewriter animation, in milliseconds.
    pub typewriter_max_duration: u64,
    pub focus_dim_opacity: f32,
    /// Longest an explicit flush waits for the store, in milliseconds.
    pub save_flush_timeout: u64,
    pub focus_mode: bool,
    pub typewriter_mode: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            auto_save_interval: DEFAULT_AUTO_SAVE_INTERVAL_MS,
            selection_throttle: DEFAULT_SELECTION_THROTTLE_MS,
            typewriter_max_duration: DEFAULT_TYPEWRITER_MAX_DURATION_MS,
            focus_dim_opacity: DEFAULT_FOCUS_DIM_OPACITY,
            save_flush_timeout: DEFAULT_SAVE_FLUSH_TIMEOUT_MS,
            focus_mode: false,
            typewriter_mode: false,
        }
    }
}

/// Expand tilde (~) in paths to the user's home directory
fn expand_tilde(path: String) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = resolve_home_dir() {
            return home.join(rest).to_string_lossy().to_string();
        }
    }
    path
}

fn resolve_home_dir() -> Option<PathBuf> {
    if let Ok(home) = env::var("HOME") {
        if !home.trim().is_empty() {
            return Some(PathBuf::from(home));
        }
    }

    if let Ok(profile) = env::var("USERPROFILE") {
        if !profile.trim().is_empty() {
            return Some(PathBuf::from(profile));
        }
    }

    std::env::current_dir().ok()
}

fn default_db_path() -> String {
    let home = resolve_home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".cache")
        .join(DEFAULT_DB_DIR_NAME)
        .join("db")
        .to_string_lossy()
        .to_string()
}

/// Parse a boolean-like environment flag value.
///
/// # Supported Values
/// - Truthy: `1`, `true`, `yes`, `on`
/// - Falsy: `0`, `false`, `no`, `off`, empty string
///
/// Matching is case-insensitive and ignores surrounding whitespace.
pub fn parse_env_flag(value: &str) -> Option<bool> {
    let normalized = value.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Read a boolean flag from the environment.
///
/// Missing or unrecognized values are treated as `false`.
pub fn env_flag_enabled(name: &str) -> bool {
    env::var(name)
        .ok()
        .and_then(|value| parse_env_flag(&value))
        .unwrap_or(false)
}

fn env_parsed<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|raw| raw.trim().parse().ok())
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Returns
    /// A populated [`Config`] with defaults applied when env vars are missing
    /// or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            db_path: env::var("DB_PATH")
                .map(expand_tilde)
                .unwrap_or(defaults.db_path),
            auto_save_interval: env_parsed("AUTO_SAVE_INTERVAL")
                .unwrap_or(defaults.auto_save_interval),
            selection_throttle: env_parsed("SELECTION_THROTTLE_MS")
                .unwrap_or(defaults.selection_throttle),
            typewriter_max_duration: env_parsed("TYPEWRITER_MAX_DURATION_MS")
                .filter(|ms| *ms > 0)
                .unwrap_or(defaults.typewriter_max_duration),
            focus_dim_opacity: env_parsed::<f32>("FOCUS_DIM_OPACITY")
                .filter(|value| value.is_finite())
                .map(|value| value.clamp(0.0, 1.0))
                .unwrap_or(defaults.focus_dim_opacity),
            save_flush_timeout: env_parsed("SAVE_FLUSH_TIMEOUT_MS")
                .unwrap_or(defaults.save_flush_timeout),
            focus_mode: env_flag_enabled("HUSHPAD_FOCUS_MODE"),
            typewriter_mode: env_flag_enabled("HUSHPAD_TYPEWRITER_MODE"),
        }
    }

    pub fn auto_save_delay(&self) -> Duration {
        Duration::from_millis(self.auto_save_interval)
    }

    pub fn selection_throttle_interval(&self) -> Duration {
        Duration::from_millis(self.selection_throttle)
    }

    pub fn typewriter_max_duration(&self) -> Duration {
        Duration::from_millis(self.typewriter_max_duration)
    }

    pub fn save_flush_timeout(&self) -> Duration {
        Duration::from_millis(self.save_flush_timeout)
    }
}
