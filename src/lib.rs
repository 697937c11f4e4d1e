//! Chime: durable personal reminder scheduler.
//!
//! Reminders are split across two execution contexts:
//!
//! - **Foreground** ([`scheduler::ScheduleController`], [`host::Reminders`]):
//!   long-lived, owns the user-facing API, writes every request to the store
//!   before announcing it.
//! - **Background** ([`scheduler::BackgroundScheduler`]): may be restarted at
//!   any time, owns the timers, displays notifications, and rebuilds its
//!   state from the store on every start.
//!
//! The [`store`] is the single source of truth; timers and messages are
//! caches and hints on top of it.

pub mod chime_dirs;
pub mod config;
pub mod error;
pub mod host;
pub mod notification;
pub mod scheduler;
pub mod store;

pub use config::ChimeConfig;
pub use error::{ChimeError, Result};
pub use host::Reminders;
pub use notification::{NotificationDescriptor, NotificationKind};
pub use scheduler::{BackgroundScheduler, Confirmation, ScheduleController, ScheduleRecord};
pub use store::{MemoryScheduleStore, ScheduleStore, SqliteScheduleStore};
