//! Foreground-facing surfaces: the message contract and channel between the
//! two contexts, interaction routing, the collaborator API, and the stdio
//! bridge.

pub mod channel;
pub mod contract;
pub mod reminders;
pub mod router;
pub mod stdio;

pub use channel::{BackgroundEndpoint, BackgroundLink, link};
pub use contract::{SchedulerCommand, SchedulerEvent};
pub use reminders::{ReminderAction, Reminders};
pub use router::{ActionRouter, Intent};
