//! Per-kind notification defaults.
//!
//! Pure lookup: no state, no I/O.

use super::descriptor::{NotificationAction, NotificationDescriptor, NotificationKind};
use super::display::DisplayPayload;
use crate::config::DisplayConfig;

/// Well-known action ids.
pub const ACTION_SNOOZE: &str = "snooze";
pub const ACTION_DISMISS: &str = "dismiss";
pub const ACTION_CHECKIN: &str = "checkin";
pub const ACTION_CELEBRATE: &str = "celebrate";
pub const ACTION_START: &str = "start";

/// Defaults applied to a descriptor of a given kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindDefaults {
    /// Vibration pattern in milliseconds (on, off, on, ...).
    pub vibrate: &'static [u32],
    /// Default `(action, title)` buttons.
    pub actions: &'static [(&'static str, &'static str)],
    /// Whether the notification must stay until the user acts.
    pub require_interaction: bool,
}

const FOCUS_END: KindDefaults = KindDefaults {
    vibrate: &[300, 100, 300, 100, 300],
    actions: &[(ACTION_START, "Start next"), (ACTION_DISMISS, "Done")],
    require_interaction: true,
};

const MORNING_CHECKIN: KindDefaults = KindDefaults {
    vibrate: &[200, 100, 200],
    actions: &[(ACTION_CHECKIN, "Check in"), (ACTION_SNOOZE, "Later")],
    require_interaction: true,
};

const STREAK_PROTECTION: KindDefaults = KindDefaults {
    vibrate: &[100, 50, 100, 50, 100],
    actions: &[(ACTION_CELEBRATE, "Keep my streak"), (ACTION_DISMISS, "Dismiss")],
    require_interaction: false,
};

const FROG_REMINDER: KindDefaults = KindDefaults {
    vibrate: &[200, 100, 200, 100, 400],
    actions: &[(ACTION_START, "Start now"), (ACTION_SNOOZE, "Snooze")],
    require_interaction: false,
};

const GENERIC: KindDefaults = KindDefaults {
    vibrate: &[200, 100, 200],
    actions: &[(ACTION_SNOOZE, "Snooze"), (ACTION_DISMISS, "Dismiss")],
    require_interaction: false,
};

/// Look up the defaults for `kind`.
#[must_use]
pub fn defaults_for(kind: &NotificationKind) -> KindDefaults {
    match kind {
        NotificationKind::FocusEnd => FOCUS_END,
        NotificationKind::MorningCheckin => MORNING_CHECKIN,
        NotificationKind::StreakProtection => STREAK_PROTECTION,
        NotificationKind::FrogReminder => FROG_REMINDER,
        NotificationKind::Custom(_) => GENERIC,
    }
}

/// Merge a descriptor with its kind defaults and the display config.
///
/// Explicit descriptor fields always win over defaults.
#[must_use]
pub fn build_payload(descriptor: &NotificationDescriptor, display: &DisplayConfig) -> DisplayPayload {
    let defaults = defaults_for(&descriptor.kind);

    let actions = if descriptor.actions.is_empty() {
        defaults
            .actions
            .iter()
            .map(|(action, title)| NotificationAction::new(*action, *title))
            .collect()
    } else {
        descriptor.actions.clone()
    };

    let mut data = descriptor.data.clone();
    if data.url.is_none() {
        data.url = Some(display.default_url.clone());
    }

    DisplayPayload {
        tag: descriptor.id.clone(),
        kind: descriptor.kind.clone(),
        title: descriptor.title.clone(),
        body: descriptor.body.clone(),
        icon: descriptor
            .icon
            .clone()
            .unwrap_or_else(|| display.default_icon.clone()),
        badge: descriptor
            .badge
            .clone()
            .unwrap_or_else(|| display.default_badge.clone()),
        vibrate: defaults.vibrate.to_vec(),
        require_interaction: descriptor
            .require_interaction
            .unwrap_or(defaults.require_interaction),
        actions,
        data,
    }
}
