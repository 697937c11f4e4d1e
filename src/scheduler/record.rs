//! Persisted schedule records.

use super::recurrence::{TimeOfDay, next_daily_occurrence};
use crate::error::{ChimeError, Result};
use crate::notification::NotificationDescriptor;
use serde::{Deserialize, Serialize};

/// Id of the singleton recurring check-in.
pub const DAILY_CHECKIN_ID: &str = "daily-checkin";

/// Suffix of the id a snoozed copy of a recurring notification lives under.
pub const SNOOZE_ID_SUFFIX: &str = ":snooze";

/// How a record repeats after it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Recurrence {
    /// Every day at a local wall-clock time.
    Daily {
        /// Local time of day.
        time_of_day: TimeOfDay,
    },
}

impl Recurrence {
    /// Next fire time strictly after `now_ms`.
    #[must_use]
    pub fn next_after(&self, now_ms: i64) -> i64 {
        match self {
            Self::Daily { time_of_day } => next_daily_occurrence(*time_of_day, now_ms),
        }
    }
}

impl std::fmt::Display for Recurrence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Daily { time_of_day } => write!(f, "daily at {time_of_day}"),
        }
    }
}

/// A durable description of a future notification.
///
/// Times are always absolute so a recovery pass after an arbitrary pause
/// computes the correct remaining delay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRecord {
    /// Matches `descriptor.id`.
    pub id: String,
    /// Absolute fire time, epoch milliseconds.
    pub fire_at_ms: i64,
    pub descriptor: NotificationDescriptor,
    #[serde(default)]
    pub recurrence: Option<Recurrence>,
}

impl ScheduleRecord {
    /// A record that fires once and is then deleted.
    #[must_use]
    pub fn one_shot(descriptor: NotificationDescriptor, fire_at_ms: i64) -> Self {
        Self {
            id: descriptor.id.clone(),
            fire_at_ms,
            descriptor,
            recurrence: None,
        }
    }

    /// A record that re-arms itself after firing.
    #[must_use]
    pub fn recurring(
        descriptor: NotificationDescriptor,
        fire_at_ms: i64,
        recurrence: Recurrence,
    ) -> Self {
        Self {
            id: descriptor.id.clone(),
            fire_at_ms,
            descriptor,
            recurrence: Some(recurrence),
        }
    }

    #[must_use]
    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_some()
    }

    /// `true` once the fire time has been reached.
    #[must_use]
    pub fn is_due(&self, now_ms: i64) -> bool {
        self.fire_at_ms <= now_ms
    }

    /// The replacement record for the next occurrence, if recurring.
    #[must_use]
    pub fn next_occurrence(&self, now_ms: i64) -> Option<Self> {
        let recurrence = self.recurrence?;
        Some(Self {
            fire_at_ms: recurrence.next_after(now_ms),
            ..self.clone()
        })
    }

    /// Structural checks applied before every write.
    pub fn validate(&self) -> Result<()> {
        if self.id != self.descriptor.id {
            return Err(ChimeError::InvalidSchedule(format!(
                "record id '{}' does not match descriptor id '{}'",
                self.id, self.descriptor.id
            )));
        }
        self.descriptor.validate()
    }
}

/// Id under which a snoozed copy of `id` is stored when `id` is recurring.
#[must_use]
pub fn snooze_id(id: &str) -> String {
    if id.ends_with(SNOOZE_ID_SUFFIX) {
        id.to_owned()
    } else {
        format!("{id}{SNOOZE_ID_SUFFIX}")
    }
}
