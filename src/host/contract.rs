//! Versioned foreground <-> background message contract.
//!
//! Commands and events are plain serde enums tagged with a
//! `SCREAMING_SNAKE_CASE` `type` field so they read the same in logs, over
//! the in-process channel, and on the stdio bridge.

use crate::notification::{NotificationData, NotificationDescriptor, NotificationKind};
use crate::scheduler::record::{Recurrence, ScheduleRecord};
use serde::{Deserialize, Serialize};

/// Contract version carried by every bridge envelope.
pub const PROTOCOL_VERSION: u32 = 1;

/// Foreground -> background.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchedulerCommand {
    /// Arm (or re-arm) the timer for `record.id`.
    Schedule(ScheduleRecord),
    /// Drop the timer for `id`, if any.
    Cancel { id: String },
    /// Display immediately without touching the store.
    ShowNow { descriptor: NotificationDescriptor },
    /// The platform reports a click on a displayed notification.
    Interaction {
        notification: NotificationDescriptor,
        /// Action button id, `None` for a body tap.
        #[serde(default)]
        action: Option<String>,
    },
}

impl SchedulerCommand {
    /// Wire name of the command, for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Schedule(_) => "SCHEDULE",
            Self::Cancel { .. } => "CANCEL",
            Self::ShowNow { .. } => "SHOW_NOW",
            Self::Interaction { .. } => "INTERACTION",
        }
    }

    /// Schedule id the command refers to.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Schedule(record) => &record.id,
            Self::Cancel { id } => id,
            Self::ShowNow { descriptor } => &descriptor.id,
            Self::Interaction { notification, .. } => &notification.id,
        }
    }
}

/// Background -> foreground.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchedulerEvent {
    /// A timer is armed for `id`.
    Scheduled { id: String, fire_at_ms: i64 },
    /// A recurring record fired and was advanced to its next occurrence.
    Rescheduled {
        id: String,
        fire_at_ms: i64,
        recurrence: Recurrence,
    },
    /// A notification was displayed.
    Fired { id: String },
    /// The user interacted with a displayed notification.
    Action {
        kind: NotificationKind,
        action_id: Option<String>,
        data: NotificationData,
        /// The descriptor that was clicked, so the foreground can snooze it.
        notification: NotificationDescriptor,
    },
    /// The platform refused to display. Reported once per denial streak.
    PermissionDenied { id: String },
}

impl SchedulerEvent {
    /// Schedule id the event refers to.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Scheduled { id, .. }
            | Self::Rescheduled { id, .. }
            | Self::Fired { id }
            | Self::PermissionDenied { id } => id,
            Self::Action { notification, .. } => &notification.id,
        }
    }
}

/// A versioned event line written by the stdio bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub v: u32,
    pub event: SchedulerEvent,
}

impl EventEnvelope {
    #[must_use]
    pub fn new(event: SchedulerEvent) -> Self {
        Self {
            v: PROTOCOL_VERSION,
            event,
        }
    }
}

/// A versioned response line written by the stdio bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub v: u32,
    pub request_id: String,
    pub ok: bool,
    pub payload: serde_json::Value,
    pub error: Option<String>,
}

impl ResponseEnvelope {
    /// Build a successful response envelope.
    #[must_use]
    pub fn ok(request_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            v: PROTOCOL_VERSION,
            request_id: request_id.into(),
            ok: true,
            payload,
            error: None,
        }
    }

    /// Build an error response envelope.
    #[must_use]
    pub fn error(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            v: PROTOCOL_VERSION,
            request_id: request_id.into(),
            ok: false,
            payload: serde_json::Value::Null,
            error: Some(message.into()),
        }
    }
}
