//! Daily recurrence arithmetic.
//!
//! Pure functions only: every result depends on the arguments alone, so the
//! engine can be exercised with fixed timezones in tests.

use crate::error::{ChimeError, Result};
use chrono::{DateTime, Duration, Local, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Millisecond length of a nominal day, used only when a timestamp is out of chrono's range.
const MILLIS_PER_DAY: i64 = 86_400_000;

/// Longest DST gap probed when a wall-clock time does not exist.
const MAX_GAP_MINUTES: i64 = 180;

/// A wall-clock time of day, `"HH:MM"` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    /// Build a time of day, validating ranges.
    pub fn new(hour: u8, minute: u8) -> Result<Self> {
        if hour > 23 || minute > 59 {
            return Err(ChimeError::InvalidSchedule(format!(
                "time of day {hour:02}:{minute:02} is out of range"
            )));
        }
        Ok(Self { hour, minute })
    }

    /// Parse `"HH:MM"` (leading zero optional on the hour).
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = || ChimeError::InvalidSchedule(format!("expected HH:MM, got '{raw}'"));
        let (hour, minute) = raw.trim().split_once(':').ok_or_else(invalid)?;
        if minute.len() != 2 || hour.is_empty() || hour.len() > 2 {
            return Err(invalid());
        }
        let hour: u8 = hour.parse().map_err(|_| invalid())?;
        let minute: u8 = minute.parse().map_err(|_| invalid())?;
        Self::new(hour, minute)
    }

    #[must_use]
    pub fn hour(self) -> u8 {
        self.hour
    }

    #[must_use]
    pub fn minute(self) -> u8 {
        self.minute
    }

    fn on(self, date: NaiveDate) -> NaiveDateTime {
        date.and_hms_opt(u32::from(self.hour), u32::from(self.minute), 0)
            .unwrap_or_else(|| date.and_time(chrono::NaiveTime::MIN))
    }
}

impl std::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for TimeOfDay {
    type Err = ChimeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = ChimeError;

    fn try_from(raw: String) -> Result<Self> {
        Self::parse(&raw)
    }
}

impl From<TimeOfDay> for String {
    fn from(t: TimeOfDay) -> Self {
        t.to_string()
    }
}

/// Next instant strictly after `now` at `time_of_day` in `now`'s timezone.
///
/// Advances by one calendar day rather than 24 hours, so the wall-clock time
/// stays fixed across DST transitions. A time that falls in a DST gap maps to
/// the first valid instant after the gap; an ambiguous time maps to the
/// earlier instant.
#[must_use]
pub fn next_daily_occurrence_in<Tz: TimeZone>(
    time_of_day: TimeOfDay,
    now: &DateTime<Tz>,
) -> DateTime<Tz> {
    let tz = now.timezone();
    let today = now.date_naive();

    let candidate = resolve_local(&tz, time_of_day.on(today));
    if candidate > *now {
        return candidate;
    }

    let tomorrow = today.succ_opt().unwrap_or(today);
    resolve_local(&tz, time_of_day.on(tomorrow))
}

/// [`next_daily_occurrence_in`] for epoch milliseconds in an explicit timezone.
#[must_use]
pub fn next_daily_occurrence_tz<Tz: TimeZone>(time_of_day: TimeOfDay, now_ms: i64, tz: &Tz) -> i64 {
    match DateTime::<Utc>::from_timestamp_millis(now_ms) {
        Some(utc) => next_daily_occurrence_in(time_of_day, &utc.with_timezone(tz)).timestamp_millis(),
        None => now_ms.saturating_add(MILLIS_PER_DAY),
    }
}

/// Next occurrence of `time_of_day` in the local timezone, as epoch milliseconds.
#[must_use]
pub fn next_daily_occurrence(time_of_day: TimeOfDay, now_ms: i64) -> i64 {
    next_daily_occurrence_tz(time_of_day, now_ms, &Local)
}

fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => {
            for minutes in 1..=MAX_GAP_MINUTES {
                let shifted = naive + Duration::minutes(minutes);
                match tz.from_local_datetime(&shifted) {
                    LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => return dt,
                    LocalResult::None => continue,
                }
            }
            tz.from_utc_datetime(&naive)
        }
    }
}
