//! Error types for the reminder scheduler.

/// Top-level error type for scheduling and delivery.
#[derive(Debug, thiserror::Error)]
pub enum ChimeError {
    /// The platform has not granted notification permission.
    #[error("notification permission denied")]
    PermissionDenied,

    /// The record is durably stored but the background context did not
    /// acknowledge it in time.
    #[error("delivery uncertain for '{id}': {reason}")]
    DeliveryUncertain {
        /// Schedule id that was written but not acknowledged.
        id: String,
        /// Why confirmation could not be obtained.
        reason: String,
    },

    /// The request can never fire (past one-shot time, malformed descriptor).
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    /// Durable storage is inaccessible.
    #[error("schedule store unavailable: {0}")]
    StoreUnavailable(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),

    /// JSON encode/decode error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl ChimeError {
    /// Build a [`ChimeError::DeliveryUncertain`].
    pub fn delivery_uncertain(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DeliveryUncertain {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

impl From<rusqlite::Error> for ChimeError {
    fn from(e: rusqlite::Error) -> Self {
        Self::StoreUnavailable(e.to_string())
    }
}

impl From<serde_json::Error> for ChimeError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, ChimeError>;
