//! Notification interaction routing.
//!
//! Maps a click on a displayed notification to an application intent. The
//! notification itself has already been closed by the background context
//! by the time an intent is resolved.

use crate::config::ChimeConfig;
use crate::notification::catalog::{
    ACTION_CELEBRATE, ACTION_CHECKIN, ACTION_DISMISS, ACTION_SNOOZE, ACTION_START,
};
use crate::notification::{NotificationDescriptor, NotificationKind};
use std::time::Duration;

/// What the application should do in response to an interaction.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// Bring the app to the foreground at `url`.
    Open { url: String },
    /// Show the notification again after `delay`.
    Snooze {
        notification: NotificationDescriptor,
        delay: Duration,
    },
    /// Nothing beyond closing the notification.
    Dismiss,
    /// Open `url` and record that the user engaged with `kind` today.
    OpenAndAck { url: String, kind: NotificationKind },
    /// Open `url` and start working on `task_id`.
    StartTask { task_id: String, url: String },
}

impl Intent {
    /// Short name for logs and the stdio bridge.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Open { .. } => "open",
            Self::Snooze { .. } => "snooze",
            Self::Dismiss => "dismiss",
            Self::OpenAndAck { .. } => "open_and_ack",
            Self::StartTask { .. } => "start_task",
        }
    }
}

/// Stateless interaction -> intent mapping.
#[derive(Debug, Clone)]
pub struct ActionRouter {
    snooze_delay: Duration,
    default_url: String,
}

impl Default for ActionRouter {
    fn default() -> Self {
        Self::from_config(&ChimeConfig::default())
    }
}

impl ActionRouter {
    pub fn new(snooze_delay: Duration, default_url: impl Into<String>) -> Self {
        Self {
            snooze_delay,
            default_url: default_url.into(),
        }
    }

    #[must_use]
    pub fn from_config(config: &ChimeConfig) -> Self {
        Self::new(config.delivery.snooze_delay(), config.display.default_url.clone())
    }

    /// Resolve a click. `action_id` is `None` for a tap on the body.
    #[must_use]
    pub fn resolve(&self, notification: &NotificationDescriptor, action_id: Option<&str>) -> Intent {
        let url = notification
            .data
            .url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| self.default_url.clone());

        match action_id {
            None => Intent::Open { url },
            Some(ACTION_SNOOZE) => Intent::Snooze {
                notification: notification.clone(),
                delay: self.snooze_delay,
            },
            Some(ACTION_DISMISS) => Intent::Dismiss,
            Some(ACTION_CHECKIN | ACTION_CELEBRATE) => Intent::OpenAndAck {
                url,
                kind: notification.kind.clone(),
            },
            Some(ACTION_START) => match &notification.data.task_id {
                Some(task_id) => Intent::StartTask {
                    task_id: task_id.clone(),
                    url,
                },
                None => Intent::Open { url },
            },
            Some(_) => Intent::Open { url },
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn checkin() -> NotificationDescriptor {
        NotificationDescriptor::new(
            "daily-checkin",
            NotificationKind::MorningCheckin,
            "Good morning",
            "Plan your day",
        )
        .with_url("/checkin")
    }

    #[test]
    fn body_tap_opens_the_url() {
        let router = ActionRouter::default();
        assert_eq!(
            router.resolve(&checkin(), None),
            Intent::Open {
                url: "/checkin".to_owned()
            }
        );
    }

    #[test]
    fn body_tap_on_streak_protection_also_opens() {
        let router = ActionRouter::default();
        let streak = NotificationDescriptor::new(
            "streak",
            NotificationKind::StreakProtection,
            "Streak",
            "Keep it going",
        );
        assert_eq!(
            router.resolve(&streak, None),
            Intent::Open { url: "/".to_owned() }
        );
    }

    #[test]
    fn snooze_carries_the_notification_and_default_delay() {
        let router = ActionRouter::default();
        match router.resolve(&checkin(), Some("snooze")) {
            Intent::Snooze {
                notification,
                delay,
            } => {
                assert_eq!(notification, checkin());
                assert_eq!(delay, Duration::from_secs(30 * 60));
            }
            other => panic!("unexpected intent {other:?}"),
        }
    }

    #[test]
    fn checkin_and_celebrate_acknowledge() {
        let router = ActionRouter::default();
        for action in ["checkin", "celebrate"] {
            assert_eq!(
                router.resolve(&checkin(), Some(action)),
                Intent::OpenAndAck {
                    url: "/checkin".to_owned(),
                    kind: NotificationKind::MorningCheckin
                }
            );
        }
    }

    #[test]
    fn dismiss_does_nothing_else() {
        let router = ActionRouter::default();
        assert_eq!(router.resolve(&checkin(), Some("dismiss")), Intent::Dismiss);
    }

    #[test]
    fn start_needs_a_task_id() {
        let router = ActionRouter::new(Duration::from_secs(60), "/app");
        let frog = NotificationDescriptor::new("frog", NotificationKind::FrogReminder, "Frog", "Eat it")
            .with_task_id("task-3");
        assert_eq!(
            router.resolve(&frog, Some("start")),
            Intent::StartTask {
                task_id: "task-3".to_owned(),
                url: "/app".to_owned()
            }
        );

        let no_task =
            NotificationDescriptor::new("focus", NotificationKind::FocusEnd, "Focus", "Done");
        assert_eq!(
            router.resolve(&no_task, Some("start")),
            Intent::Open { url: "/app".to_owned() }
        );
    }

    #[test]
    fn unknown_actions_fall_back_to_open() {
        let router = ActionRouter::default();
        let intent = router.resolve(&checkin(), Some("share"));
        assert_eq!(intent.name(), "open");
    }
}
