//! Notification descriptor model.
//!
//! A [`NotificationDescriptor`] is what a caller asks to display. It is
//! merged with the catalog defaults for its [`NotificationKind`] at fire
//! time to produce a [`DisplayPayload`](super::display::DisplayPayload).

use crate::error::{ChimeError, Result};
use serde::{Deserialize, Serialize};

/// Platform limit on action buttons per notification.
pub const MAX_ACTIONS: usize = 2;

/// Suffix appended to the body of a snoozed notification.
pub const SNOOZED_MARKER: &str = "(snoozed)";

/// Notification kind (tag). Drives vibration and default actions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NotificationKind {
    /// A focus session ended.
    FocusEnd,
    /// The recurring daily check-in.
    MorningCheckin,
    /// The user's streak is about to break.
    StreakProtection,
    /// Reminder about the day's hardest task.
    FrogReminder,
    /// Any other caller-defined tag.
    Custom(String),
}

impl NotificationKind {
    /// Tag used for caller-scheduled task reminders.
    pub const TASK_REMINDER: &'static str = "task-reminder";

    /// Render the kind to its wire tag.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::FocusEnd => "focus-end",
            Self::MorningCheckin => "morning_checkin",
            Self::StreakProtection => "streak_protection",
            Self::FrogReminder => "frog-reminder",
            Self::Custom(tag) => tag.as_str(),
        }
    }

    /// Parse a wire tag. Unknown tags become [`NotificationKind::Custom`].
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "focus-end" => Self::FocusEnd,
            "morning_checkin" => Self::MorningCheckin,
            "streak_protection" => Self::StreakProtection,
            "frog-reminder" => Self::FrogReminder,
            other => Self::Custom(other.to_owned()),
        }
    }

    /// Kind for a task-linked reminder.
    #[must_use]
    pub fn task_reminder() -> Self {
        Self::Custom(Self::TASK_REMINDER.to_owned())
    }
}

impl From<String> for NotificationKind {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<NotificationKind> for String {
    fn from(kind: NotificationKind) -> Self {
        kind.as_str().to_owned()
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An action button on a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    /// Machine-readable action identifier (`"snooze"`, `"checkin"`, ...).
    pub action: String,
    /// Button label.
    pub title: String,
}

impl NotificationAction {
    pub fn new(action: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            title: title.into(),
        }
    }
}

/// Opaque payload echoed back on interaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationData {
    /// Route to open when the notification is clicked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Task this reminder belongs to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    /// Caller-defined extra fields, passed through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The payload to display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationDescriptor {
    /// Unique id within the store; also the platform notification tag.
    pub id: String,
    /// Kind tag.
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
    #[serde(default)]
    pub data: NotificationData,
    /// Explicit override; `None` uses the catalog default for `kind`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_interaction: Option<bool>,
    /// Explicit actions; empty uses the catalog default for `kind`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<NotificationAction>,
}

impl NotificationDescriptor {
    /// Create a descriptor with catalog defaults for everything optional.
    pub fn new(
        id: impl Into<String>,
        kind: NotificationKind,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            title: title.into(),
            body: body.into(),
            icon: None,
            badge: None,
            data: NotificationData::default(),
            require_interaction: None,
            actions: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.data.url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_task_id(mut self, task_id: impl Into<String>) -> Self {
        self.data.task_id = Some(task_id.into());
        self
    }

    #[must_use]
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    #[must_use]
    pub fn with_actions(mut self, actions: Vec<NotificationAction>) -> Self {
        self.actions = actions;
        self
    }

    #[must_use]
    pub fn with_require_interaction(mut self, require: bool) -> Self {
        self.require_interaction = Some(require);
        self
    }

    /// Reject descriptors the platform could never display.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(ChimeError::InvalidSchedule(
                "notification id must not be empty".to_owned(),
            ));
        }
        if self.title.trim().is_empty() {
            return Err(ChimeError::InvalidSchedule(format!(
                "notification '{}' has an empty title",
                self.id
            )));
        }
        if self.body.trim().is_empty() {
            return Err(ChimeError::InvalidSchedule(format!(
                "notification '{}' has an empty body",
                self.id
            )));
        }
        if self.actions.len() > MAX_ACTIONS {
            return Err(ChimeError::InvalidSchedule(format!(
                "notification '{}' has {} actions; at most {MAX_ACTIONS} allowed",
                self.id,
                self.actions.len()
            )));
        }
        if let Some(action) = self.actions.iter().find(|a| a.action.trim().is_empty()) {
            return Err(ChimeError::InvalidSchedule(format!(
                "notification '{}' has an action '{}' without an id",
                self.id, action.title
            )));
        }
        Ok(())
    }

    /// Copy with the body annotated as snoozed. Never stacks the marker.
    #[must_use]
    pub fn snoozed(&self) -> Self {
        let mut copy = self.clone();
        if !copy.body.ends_with(SNOOZED_MARKER) {
            copy.body = format!("{} {SNOOZED_MARKER}", copy.body.trim_end());
        }
        copy
    }
}
