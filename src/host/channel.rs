//! In-process message channel between the foreground and background contexts.
//!
//! Commands travel over a bounded `mpsc` and are sent with `try_send`, so a
//! foreground caller never waits on the background. Events travel over a
//! `broadcast`, so any number of foreground instances can observe them.

use crate::error::{ChimeError, Result};
use crate::host::contract::{SchedulerCommand, SchedulerEvent};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

/// Foreground handle: send commands, subscribe to events.
#[derive(Clone)]
pub struct BackgroundLink {
    command_tx: mpsc::Sender<SchedulerCommand>,
    event_tx: broadcast::Sender<SchedulerEvent>,
}

impl BackgroundLink {
    /// Queue a command without waiting.
    ///
    /// Fails with [`ChimeError::Channel`] when the queue is full or the
    /// background context is gone.
    pub fn try_send(&self, command: SchedulerCommand) -> Result<()> {
        let name = command.name();
        match self.command_tx.try_send(command) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(ChimeError::Channel(format!(
                "background command queue full; {name} not delivered"
            ))),
            Err(TrySendError::Closed(_)) => Err(ChimeError::Channel(format!(
                "background context unreachable; {name} not delivered"
            ))),
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.event_tx.subscribe()
    }

    /// Reserve one queue slot without waiting.
    ///
    /// Lets a caller make a store change only when the command announcing
    /// it is certain to be queued.
    pub fn try_reserve(&self) -> Result<mpsc::Permit<'_, SchedulerCommand>> {
        self.command_tx.try_reserve().map_err(|e| match e {
            TrySendError::Full(()) => {
                ChimeError::Channel("background command queue full".to_owned())
            }
            TrySendError::Closed(()) => {
                ChimeError::Channel("background context unreachable".to_owned())
            }
        })
    }
}

/// Background handle: receive commands, emit events.
pub struct BackgroundEndpoint {
    pub(crate) command_rx: mpsc::Receiver<SchedulerCommand>,
    event_tx: broadcast::Sender<SchedulerEvent>,
}

impl BackgroundEndpoint {
    /// Broadcast an event. Having no subscribers is not an error.
    pub fn emit(&self, event: SchedulerEvent) {
        if self.event_tx.send(event).is_err() {
            debug!("no foreground subscribers; event dropped");
        }
    }
}

/// Create a connected link/endpoint pair.
#[must_use]
pub fn link(command_capacity: usize, event_capacity: usize) -> (BackgroundLink, BackgroundEndpoint) {
    let (command_tx, command_rx) = mpsc::channel(command_capacity.max(1));
    let (event_tx, _event_rx) = broadcast::channel(event_capacity.max(1));

    (
        BackgroundLink {
            command_tx,
            event_tx: event_tx.clone(),
        },
        BackgroundEndpoint {
            command_rx,
            event_tx,
        },
    )
}
