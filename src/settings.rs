//! Persisted user settings
//!
//! The settings document is a JSON file rewritten atomically on every
//! change. It holds the values that must survive a restart (volume, EQ
//! presets, current source, device identity, Wi-Fi credentials) and the EQ
//! gain tables used by the translator.

mod document;
pub mod persistence_actor;
mod store;

pub use document::{EqTables, GainTable, Settings, WifiSettings};
pub use store::{LoadOutcome, SettingsStore};

use thiserror::Error;

/// Errors raised by the settings store
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings document is invalid: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("settings write failed: {0}")]
    Persist(String),

    #[error("settings writer has stopped")]
    WriterStopped,
}
