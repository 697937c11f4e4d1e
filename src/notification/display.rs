//! The platform "display a notification" primitive.
//!
//! The background scheduler only ever talks to the platform through
//! [`NotificationDisplay`]. Hosts plug in their native implementation;
//! [`LogDisplay`] and [`RecordingDisplay`] cover headless runs and tests.

use super::descriptor::{NotificationAction, NotificationData, NotificationKind};
use crate::error::{ChimeError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Final, fully-defaulted notification handed to the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayPayload {
    /// Platform tag; equal to the schedule id so re-display replaces.
    pub tag: String,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub require_interaction: bool,
    pub actions: Vec<NotificationAction>,
    pub data: NotificationData,
}

/// Platform notification surface.
pub trait NotificationDisplay: Send + Sync + 'static {
    /// Show a notification.
    ///
    /// Returns [`ChimeError::PermissionDenied`] when the platform refuses.
    fn show(&self, payload: &DisplayPayload) -> Result<()>;

    /// Close a displayed notification by tag. Closing an absent tag is not an error.
    fn close(&self, tag: &str) -> Result<()>;
}

/// Display that only writes a log line. Used by the headless host.
#[derive(Debug, Default)]
pub struct LogDisplay;

impl NotificationDisplay for LogDisplay {
    fn show(&self, payload: &DisplayPayload) -> Result<()> {
        info!(
            tag = %payload.tag,
            kind = %payload.kind,
            title = %payload.title,
            "notification shown"
        );
        Ok(())
    }

    fn close(&self, tag: &str) -> Result<()> {
        info!(tag, "notification closed");
        Ok(())
    }
}

/// Display that records every call. Can be switched to deny permission.
#[derive(Debug, Default)]
pub struct RecordingDisplay {
    shown: Mutex<Vec<DisplayPayload>>,
    closed: Mutex<Vec<String>>,
    denied: AtomicBool,
}

impl RecordingDisplay {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `show` calls fail with [`ChimeError::PermissionDenied`].
    pub fn deny_permission(&self, denied: bool) {
        self.denied.store(denied, Ordering::SeqCst);
    }

    /// Payloads shown so far.
    #[must_use]
    pub fn shown(&self) -> Vec<DisplayPayload> {
        self.shown
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Tags closed so far.
    #[must_use]
    pub fn closed(&self) -> Vec<String> {
        self.closed
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl NotificationDisplay for RecordingDisplay {
    fn show(&self, payload: &DisplayPayload) -> Result<()> {
        if self.denied.load(Ordering::SeqCst) {
            return Err(ChimeError::PermissionDenied);
        }
        self.shown
            .lock()
            .map_err(|e| ChimeError::Channel(format!("display record lock poisoned: {e}")))?
            .push(payload.clone());
        Ok(())
    }

    fn close(&self, tag: &str) -> Result<()> {
        self.closed
            .lock()
            .map_err(|e| ChimeError::Channel(format!("display record lock poisoned: {e}")))?
            .push(tag.to_owned());
        Ok(())
    }
}
