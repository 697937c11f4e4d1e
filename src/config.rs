//! Configuration types for the reminder scheduler.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChimeConfig {
    /// Durable schedule store settings.
    pub store: StoreConfig,
    /// Foreground/background delivery settings.
    pub delivery: DeliveryConfig,
    /// Display defaults merged into every notification.
    pub display: DisplayConfig,
    /// Recurring daily check-in.
    pub checkin: CheckinConfig,
}

/// Schedule store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file override (None = `chime_dirs::store_file()`).
    pub path: Option<PathBuf>,
}

impl StoreConfig {
    /// Resolved database path.
    #[must_use]
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(crate::chime_dirs::store_file)
    }
}

/// Message-channel and timer tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// How long `schedule_one_shot` waits for a `SCHEDULED` acknowledgement.
    pub ack_timeout_ms: u64,
    /// Default snooze delay in minutes.
    pub snooze_minutes: u32,
    /// Longest single sleep a live timer takes before re-reading the clock.
    ///
    /// Bounds how late a timer can fire after host suspend or a wall-clock jump.
    pub max_timer_slice_secs: u64,
    /// Command channel capacity (foreground -> background).
    pub command_capacity: usize,
    /// Event broadcast capacity (background -> foreground).
    pub event_capacity: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            ack_timeout_ms: 2_000,
            snooze_minutes: 30,
            max_timer_slice_secs: 60,
            command_capacity: 64,
            event_capacity: 128,
        }
    }
}

impl DeliveryConfig {
    /// Acknowledgement timeout as a [`Duration`].
    #[must_use]
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    /// Snooze delay as a [`Duration`].
    #[must_use]
    pub fn snooze_delay(&self) -> Duration {
        Duration::from_secs(u64::from(self.snooze_minutes) * 60)
    }

    /// Max timer slice as a [`Duration`], never below one second.
    #[must_use]
    pub fn max_timer_slice(&self) -> Duration {
        Duration::from_secs(self.max_timer_slice_secs.max(1))
    }
}

/// Defaults applied to descriptors that leave assets unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Standard app icon.
    pub default_icon: String,
    /// Standard monochrome badge.
    pub default_badge: String,
    /// Route opened when a notification carries no url.
    pub default_url: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            default_icon: "/icons/icon-192x192.png".to_owned(),
            default_badge: "/icons/badge-72x72.png".to_owned(),
            default_url: "/".to_owned(),
        }
    }
}

/// Daily check-in reminder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckinConfig {
    /// Whether the host enables the check-in on startup.
    pub enabled: bool,
    /// Local time of day, `"HH:MM"`.
    pub time_of_day: String,
    /// Body text; `{time}` is replaced with the time of day.
    pub message_template: String,
}

impl Default for CheckinConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            time_of_day: "08:00".to_owned(),
            message_template: "Good morning! Time to plan your day.".to_owned(),
        }
    }
}

impl ChimeConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::ChimeError::Config(e.to_string()))
    }

    /// Load from `path` if it exists, otherwise return defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: &std::path::Path) -> crate::error::Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::ChimeError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> PathBuf {
        crate::chime_dirs::config_file()
    }
}
