//! Foreground schedule controller.
//!
//! The only component the rest of the application talks to. Every request
//! is written to the store first, then announced to the background context
//! over the channel. The store write is the commitment; the message is a
//! hint that lets the background arm a timer without waiting for recovery.

use crate::config::DeliveryConfig;
use crate::error::{ChimeError, Result};
use crate::host::channel::BackgroundLink;
use crate::host::contract::{SchedulerCommand, SchedulerEvent};
use crate::notification::{NotificationDescriptor, NotificationKind};
use crate::scheduler::clock::{Clock, SystemClock};
use crate::scheduler::record::{DAILY_CHECKIN_ID, Recurrence, ScheduleRecord, snooze_id};
use crate::scheduler::recurrence::TimeOfDay;
use crate::store::ScheduleStore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Title of the daily check-in notification.
pub const CHECKIN_TITLE: &str = "Good morning";

/// How a schedule request ended once the record was durably written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// The background context armed a timer for this fire time.
    Acknowledged { fire_at_ms: i64 },
    /// A newer request for the same id took over the wait.
    Superseded,
}

/// What a startup reconciliation pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Expired recurring records advanced to their next occurrence.
    pub advanced: Vec<String>,
    /// Future records re-announced to the background.
    pub announced: Vec<String>,
}

struct PendingAck {
    ticket: u64,
    token: CancellationToken,
}

/// Translates reminder requests into store writes and background messages.
pub struct ScheduleController {
    store: Arc<dyn ScheduleStore>,
    link: BackgroundLink,
    clock: Arc<dyn Clock>,
    ack_timeout: Duration,
    snooze_delay: Duration,
    pending: Mutex<HashMap<String, PendingAck>>,
    next_ticket: AtomicU64,
}

impl ScheduleController {
    pub fn new(store: Arc<dyn ScheduleStore>, link: BackgroundLink, delivery: &DeliveryConfig) -> Self {
        Self {
            store,
            link,
            clock: Arc::new(SystemClock),
            ack_timeout: delivery.ack_timeout(),
            snooze_delay: delivery.snooze_delay(),
            pending: Mutex::new(HashMap::new()),
            next_ticket: AtomicU64::new(0),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Configured default snooze delay.
    #[must_use]
    pub fn snooze_delay(&self) -> Duration {
        self.snooze_delay
    }

    /// Schedule `descriptor` to fire once at `fire_at_ms`.
    ///
    /// Replaces any record with the same id. Returns `DeliveryUncertain`
    /// when the background did not acknowledge in time; the record is still
    /// stored and will be picked up by recovery.
    pub async fn schedule_one_shot(
        &self,
        descriptor: NotificationDescriptor,
        fire_at_ms: i64,
    ) -> Result<Confirmation> {
        descriptor.validate()?;
        let now = self.clock.now_ms();
        if fire_at_ms <= now {
            return Err(ChimeError::InvalidSchedule(format!(
                "'{}' fire time {fire_at_ms} is not after now ({now})",
                descriptor.id
            )));
        }

        let record = ScheduleRecord::one_shot(descriptor, fire_at_ms);
        self.store.put(&record)?;
        debug!(id = %record.id, fire_at_ms, "one-shot stored");
        self.announce(record).await
    }

    /// Remove the schedule for `id` and any snoozed copy of it.
    ///
    /// Succeeds once the store is updated, even if the background context is
    /// unreachable.
    pub fn cancel(&self, id: &str) -> Result<()> {
        let snoozed = snooze_id(id);
        let mut ids = vec![id.to_owned()];
        if snoozed != id {
            ids.push(snoozed);
        }

        for target in ids {
            let removed = self.store.delete(&target)?;
            self.release(&target, None);
            if let Err(e) = self.link.try_send(SchedulerCommand::Cancel { id: target.clone() }) {
                debug!(id = %target, "cancel not delivered, store already updated: {e}");
            }
            if removed {
                info!(id = %target, "schedule cancelled");
            }
        }
        Ok(())
    }

    /// Schedule the recurring daily check-in.
    ///
    /// `{time}` in `message_template` is replaced by the time of day.
    pub async fn schedule_daily_checkin(
        &self,
        time_of_day: TimeOfDay,
        message_template: &str,
    ) -> Result<Confirmation> {
        let recurrence = Recurrence::Daily { time_of_day };
        let fire_at_ms = recurrence.next_after(self.clock.now_ms());
        let body = message_template.replace("{time}", &time_of_day.to_string());
        let descriptor = NotificationDescriptor::new(
            DAILY_CHECKIN_ID,
            NotificationKind::MorningCheckin,
            CHECKIN_TITLE,
            body,
        );

        let record = ScheduleRecord::recurring(descriptor, fire_at_ms, recurrence);
        self.store.put(&record)?;
        info!(%recurrence, fire_at_ms, "daily check-in stored");
        self.announce(record).await
    }

    /// Turn the daily check-in off.
    pub fn disable_daily_checkin(&self) -> Result<()> {
        self.cancel(DAILY_CHECKIN_ID)
    }

    /// Re-schedule `descriptor` `delay` from now with a snoozed body.
    ///
    /// When the id holds a recurring record, the snoozed copy is stored under
    /// a derived id so the recurrence is left intact.
    pub async fn snooze(
        &self,
        descriptor: &NotificationDescriptor,
        delay: Duration,
    ) -> Result<Confirmation> {
        let mut snoozed = descriptor.snoozed();
        let holds_recurring = self
            .store
            .get(&descriptor.id)?
            .is_some_and(|record| record.is_recurring());
        if holds_recurring {
            snoozed.id = snooze_id(&descriptor.id);
        }

        let delay_ms = i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
        let fire_at_ms = self.clock.now_ms().saturating_add(delay_ms.max(1));
        info!(id = %snoozed.id, fire_at_ms, "snoozing notification");
        self.schedule_one_shot(snoozed, fire_at_ms).await
    }

    /// Subscribe to background events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.link.subscribe()
    }

    /// Forward a platform click to the background, which closes the
    /// notification and reports the action back.
    pub fn report_interaction(
        &self,
        notification: NotificationDescriptor,
        action: Option<String>,
    ) -> Result<()> {
        self.link.try_send(SchedulerCommand::Interaction {
            notification,
            action,
        })
    }

    /// Current fire time of `id`, straight from the store.
    pub fn next_fire_at(&self, id: &str) -> Result<Option<i64>> {
        Ok(self.store.get(id)?.map(|record| record.fire_at_ms))
    }

    /// Startup pass mirroring the background's recovery.
    ///
    /// Expired recurring records are advanced (and shown once, if this pass
    /// advanced them); future records are re-announced. Expired one-shots are
    /// left for the background to drop, as are expired recurring records
    /// when the background cannot take a command right now.
    pub fn reconcile(&self) -> Result<ReconcileReport> {
        let now = self.clock.now_ms();
        let mut report = ReconcileReport::default();

        for record in self.store.list_all()? {
            if !record.is_due(now) {
                self.send_best_effort(SchedulerCommand::Schedule(record.clone()));
                report.announced.push(record.id);
                continue;
            }
            let Some(next) = record.next_occurrence(now) else {
                continue;
            };
            // Advancing without a queued SHOW_NOW would skip this period.
            let permit = match self.link.try_reserve() {
                Ok(permit) => permit,
                Err(e) => {
                    debug!(id = %record.id, "leaving overdue schedule to background recovery: {e}");
                    continue;
                }
            };
            if self.store.advance_if_current(&record, &next)? {
                info!(id = %record.id, next_fire_at_ms = next.fire_at_ms, "overdue recurring schedule advanced");
                permit.send(SchedulerCommand::ShowNow {
                    descriptor: record.descriptor.clone(),
                });
                self.send_best_effort(SchedulerCommand::Schedule(next));
                report.advanced.push(record.id);
            }
        }
        Ok(report)
    }

    fn send_best_effort(&self, command: SchedulerCommand) {
        let id = command.id().to_owned();
        if let Err(e) = self.link.try_send(command) {
            debug!(id, "background not reachable: {e}");
        }
    }

    /// Send SCHEDULE and wait a bounded time for SCHEDULED.
    async fn announce(&self, record: ScheduleRecord) -> Result<Confirmation> {
        let id = record.id.clone();
        let (ticket, token) = self.supersede(&id)?;
        // Subscribe before sending so the ack cannot slip past.
        let mut events = self.link.subscribe();

        if let Err(e) = self.link.try_send(SchedulerCommand::Schedule(record)) {
            self.release(&id, Some(ticket));
            warn!(id, "schedule stored but not delivered: {e}");
            return Err(ChimeError::delivery_uncertain(id, e.to_string()));
        }

        let outcome = tokio::select! {
            () = token.cancelled() => Ok(Confirmation::Superseded),
            ack = wait_for_ack(&mut events, &id) => ack,
            () = tokio::time::sleep(self.ack_timeout) => Err(ChimeError::delivery_uncertain(
                id.clone(),
                format!("no acknowledgement within {} ms", self.ack_timeout.as_millis()),
            )),
        };
        self.release(&id, Some(ticket));

        if let Err(e) = &outcome {
            warn!(id, "{e}; recovery will arm it");
        }
        outcome
    }

    /// Register a fresh wait for `id`, cancelling any earlier one.
    fn supersede(&self, id: &str) -> Result<(u64, CancellationToken)> {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed) + 1;
        let token = CancellationToken::new();
        let mut pending = self
            .pending
            .lock()
            .map_err(|e| ChimeError::Channel(format!("pending ack lock poisoned: {e}")))?;
        if let Some(previous) = pending.insert(
            id.to_owned(),
            PendingAck {
                ticket,
                token: token.clone(),
            },
        ) {
            previous.token.cancel();
        }
        Ok((ticket, token))
    }

    /// Drop the wait for `id`. With a ticket, only if it is still ours.
    fn release(&self, id: &str, ticket: Option<u64>) {
        let Ok(mut pending) = self.pending.lock() else {
            return;
        };
        let ours = match (pending.get(id), ticket) {
            (Some(current), Some(ticket)) => current.ticket == ticket,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if !ours {
            return;
        }
        if let Some(entry) = pending.remove(id) {
            if ticket.is_none() {
                entry.token.cancel();
            }
        }
    }
}

async fn wait_for_ack(
    events: &mut broadcast::Receiver<SchedulerEvent>,
    id: &str,
) -> Result<Confirmation> {
    loop {
        match events.recv().await {
            Ok(SchedulerEvent::Scheduled {
                id: acked,
                fire_at_ms,
            }) if acked == id => return Ok(Confirmation::Acknowledged { fire_at_ms }),
            Ok(_) => {}
            Err(RecvError::Lagged(n)) => debug!(id, lagged = n, "ack wait lagged"),
            Err(RecvError::Closed) => {
                return Err(ChimeError::delivery_uncertain(id, "event channel closed"));
            }
        }
    }
}
