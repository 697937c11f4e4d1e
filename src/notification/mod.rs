//! Notification model, per-kind defaults, and the display primitive.

pub mod catalog;
pub mod descriptor;
pub mod display;

pub use descriptor::{NotificationAction, NotificationData, NotificationDescriptor, NotificationKind};
pub use display::{DisplayPayload, LogDisplay, NotificationDisplay, RecordingDisplay};
