//! Centralized application directory paths.
//!
//! Uses the [`dirs`] crate for platform-appropriate directory resolution.
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | App data | `~/Library/Application Support/chime/` | `~/.local/share/chime/` |
//! | Config | `~/Library/Application Support/chime/` | `~/.config/chime/` |
//!
//! # Environment Overrides
//!
//! - `CHIME_DATA_DIR`: overrides [`data_dir`]
//! - `CHIME_CONFIG_DIR`: overrides [`config_dir`]

use std::path::PathBuf;

/// Application data root directory.
///
/// Holds the schedule database and logs. Resolves to
/// `dirs::data_dir()/chime/` unless `CHIME_DATA_DIR` is set.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("CHIME_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("chime"))
        .unwrap_or_else(|| PathBuf::from("/tmp/chime-data"))
}

/// Application config directory.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("CHIME_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("chime"))
        .unwrap_or_else(|| PathBuf::from("/tmp/chime-config"))
}

/// Log file directory (`data_dir()/logs/`).
#[must_use]
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Main config file path (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Schedule database path (`data_dir()/schedules.db`).
#[must_use]
pub fn store_file() -> PathBuf {
    data_dir().join("schedules.db")
}
