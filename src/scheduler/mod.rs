//! Reminder scheduling.
//!
//! - `controller`: foreground API, writes the store and messages the background.
//! - `background`: owns timers, fires notifications, runs recovery.
//! - `record` / `recurrence`: persisted schedule model and daily time math.
//! - `clock`: wall-clock source.

pub mod background;
pub mod clock;
pub mod controller;
pub mod record;
pub mod recurrence;

pub use background::{BackgroundScheduler, RecoveryReport};
pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{Confirmation, ReconcileReport, ScheduleController};
pub use record::{DAILY_CHECKIN_ID, Recurrence, ScheduleRecord};
pub use recurrence::TimeOfDay;
