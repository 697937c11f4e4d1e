//! Background scheduler loop.
//!
//! Owns the live timers. Spawned as a single tokio task that first runs a
//! recovery pass over the store, then processes commands and timer expiries
//! one at a time. Timer state is a cache: every command and every expiry
//! re-reads the store before acting.

use crate::config::{DeliveryConfig, DisplayConfig};
use crate::error::ChimeError;
use crate::host::channel::BackgroundEndpoint;
use crate::host::contract::{SchedulerCommand, SchedulerEvent};
use crate::notification::catalog::build_payload;
use crate::notification::{NotificationDescriptor, NotificationDisplay};
use crate::scheduler::clock::{Clock, SystemClock};
use crate::scheduler::record::ScheduleRecord;
use crate::store::ScheduleStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Outcome of a recovery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Past recurring records fired late and advanced.
    pub fired: Vec<String>,
    /// Past one-shot records deleted without firing.
    pub missed: Vec<String>,
    /// Future records re-armed.
    pub armed: Vec<String>,
    /// Records left alone because a timer was already live.
    pub skipped: Vec<String>,
}

struct LiveTimer {
    generation: u64,
    fire_at_ms: i64,
    handle: JoinHandle<()>,
}

struct TimerExpired {
    id: String,
    generation: u64,
}

/// The context that owns timers and calls the display primitive.
pub struct BackgroundScheduler {
    store: Arc<dyn ScheduleStore>,
    display: Arc<dyn NotificationDisplay>,
    clock: Arc<dyn Clock>,
    display_config: DisplayConfig,
    max_timer_slice: Duration,
    endpoint: BackgroundEndpoint,
    timers: HashMap<String, LiveTimer>,
    next_generation: u64,
    expired_tx: mpsc::UnboundedSender<TimerExpired>,
    expired_rx: mpsc::UnboundedReceiver<TimerExpired>,
    /// Set after the first denial is reported; cleared by a successful show.
    permission_reported: bool,
    recovered: bool,
}

impl BackgroundScheduler {
    pub fn new(
        store: Arc<dyn ScheduleStore>,
        display: Arc<dyn NotificationDisplay>,
        endpoint: BackgroundEndpoint,
    ) -> Self {
        let (expired_tx, expired_rx) = mpsc::unbounded_channel();
        Self {
            store,
            display,
            clock: Arc::new(SystemClock),
            display_config: DisplayConfig::default(),
            max_timer_slice: DeliveryConfig::default().max_timer_slice(),
            endpoint,
            timers: HashMap::new(),
            next_generation: 0,
            expired_tx,
            expired_rx,
            permission_reported: false,
            recovered: false,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_display_config(mut self, display_config: DisplayConfig) -> Self {
        self.display_config = display_config;
        self
    }

    pub fn with_delivery_config(mut self, delivery: &DeliveryConfig) -> Self {
        self.max_timer_slice = delivery.max_timer_slice();
        self
    }

    /// Ids with a live timer.
    #[must_use]
    pub fn armed_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.timers.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Fire time of the live timer for `id`.
    #[must_use]
    pub fn armed_fire_at(&self, id: &str) -> Option<i64> {
        self.timers.get(id).map(|t| t.fire_at_ms)
    }

    /// Rebuild timers from the store.
    ///
    /// Past recurring records fire now and advance; past one-shots are
    /// dropped as missed; future records are armed. Ids that already have a
    /// live timer are skipped.
    pub fn recover(&mut self) -> crate::Result<RecoveryReport> {
        self.recovered = true;
        let records = self.store.list_all().inspect_err(|e| {
            error!("recovery could not list schedules: {e}");
        })?;

        let mut report = RecoveryReport::default();
        for record in records {
            if self.timers.contains_key(&record.id) {
                report.skipped.push(record.id);
                continue;
            }

            let now = self.clock.now_ms();
            if !record.is_due(now) {
                self.arm(&record.id, record.fire_at_ms);
                report.armed.push(record.id);
            } else if record.is_recurring() {
                info!(id = %record.id, "recurring reminder overdue; firing late");
                let id = record.id.clone();
                if self.fire(record) {
                    report.fired.push(id);
                }
            } else {
                match self.store.delete_if_current(&record) {
                    Ok(true) => {
                        info!(id = %record.id, fire_at_ms = record.fire_at_ms, "one-shot reminder missed; dropped");
                        report.missed.push(record.id);
                    }
                    Ok(false) => self.resync(&record.id),
                    Err(e) => error!(id = %record.id, "failed to drop missed reminder: {e}"),
                }
            }
        }

        info!(
            fired = report.fired.len(),
            missed = report.missed.len(),
            armed = report.armed.len(),
            skipped = report.skipped.len(),
            "recovery complete"
        );
        Ok(report)
    }

    /// Spawn the loop. Recovery runs first if it has not already.
    ///
    /// The task ends when every [`BackgroundLink`](crate::host::channel::BackgroundLink)
    /// is dropped.
    pub fn run(mut self) -> JoinHandle<()> {
        tokio::spawn(async move {
            if !self.recovered {
                if let Err(e) = self.recover() {
                    warn!("starting without recovery: {e}");
                }
            }
            self.run_loop().await;
        })
    }

    async fn run_loop(&mut self) {
        info!("background scheduler started");
        loop {
            tokio::select! {
                command = self.endpoint.command_rx.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(expired) = self.expired_rx.recv() => self.handle_expired(expired),
            }
        }
        for (_, timer) in self.timers.drain() {
            timer.handle.abort();
        }
        info!("background scheduler stopped");
    }

    fn handle_command(&mut self, command: SchedulerCommand) {
        debug!(command = command.name(), id = command.id(), "command received");
        match command {
            SchedulerCommand::Schedule(record) => self.handle_schedule(record),
            SchedulerCommand::Cancel { id } => self.handle_cancel(&id),
            SchedulerCommand::ShowNow { descriptor } => {
                if self.show(&descriptor) {
                    self.endpoint.emit(SchedulerEvent::Fired { id: descriptor.id });
                }
            }
            SchedulerCommand::Interaction {
                notification,
                action,
            } => self.handle_interaction(notification, action),
        }
    }

    fn handle_schedule(&mut self, record: ScheduleRecord) {
        let current = match self.store.get(&record.id) {
            Ok(current) => current,
            Err(e) => {
                warn!(id = %record.id, "store unavailable, arming from message: {e}");
                Some(record.clone())
            }
        };

        match current {
            Some(current) => {
                self.arm(&current.id, current.fire_at_ms);
                self.endpoint.emit(SchedulerEvent::Scheduled {
                    id: current.id,
                    fire_at_ms: current.fire_at_ms,
                });
            }
            None => {
                debug!(id = %record.id, "schedule superseded by a later cancel");
                self.disarm(&record.id);
            }
        }
    }

    fn handle_cancel(&mut self, id: &str) {
        match self.store.get(id) {
            Ok(Some(current)) => {
                debug!(id, "cancel superseded by a later schedule");
                self.arm(&current.id, current.fire_at_ms);
            }
            Ok(None) => self.disarm(id),
            Err(e) => {
                warn!(id, "store unavailable on cancel: {e}");
                self.disarm(id);
            }
        }
    }

    fn handle_interaction(&mut self, notification: NotificationDescriptor, action: Option<String>) {
        if let Err(e) = self.display.close(&notification.id) {
            warn!(id = %notification.id, "failed to close notification: {e}");
        }
        self.endpoint.emit(SchedulerEvent::Action {
            kind: notification.kind.clone(),
            action_id: action,
            data: notification.data.clone(),
            notification,
        });
    }

    fn handle_expired(&mut self, expired: TimerExpired) {
        match self.timers.get(&expired.id) {
            Some(timer) if timer.generation == expired.generation => {}
            _ => return,
        }
        self.timers.remove(&expired.id);

        let record = match self.store.get(&expired.id) {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!(id = %expired.id, "timer expired for a removed schedule");
                return;
            }
            Err(e) => {
                error!(id = %expired.id, "store unavailable at fire time, retrying: {e}");
                let retry_at = self.clock.now_ms().saturating_add(duration_ms(self.max_timer_slice));
                self.arm(&expired.id, retry_at);
                return;
            }
        };

        if !record.is_due(self.clock.now_ms()) {
            debug!(id = %record.id, fire_at_ms = record.fire_at_ms, "schedule moved later; re-arming");
            self.arm(&record.id, record.fire_at_ms);
            return;
        }
        self.fire(record);
    }

    /// Retire or advance `record`, then display it.
    ///
    /// The store update is a claim: if another context already advanced or
    /// replaced the record, nothing is shown. Returns `false` in that case.
    fn fire(&mut self, record: ScheduleRecord) -> bool {
        let now = self.clock.now_ms();
        let next = record.next_occurrence(now);
        let claimed = match &next {
            Some(next) => self.store.advance_if_current(&record, next),
            None => self.store.delete_if_current(&record),
        };
        match claimed {
            Ok(true) => {}
            Ok(false) => {
                debug!(id = %record.id, "schedule changed since it was armed; not firing");
                self.resync(&record.id);
                return false;
            }
            Err(e) => error!(id = %record.id, "could not retire schedule, showing anyway: {e}"),
        }

        let shown = self.show(&record.descriptor);

        if let Some(next) = next {
            self.arm(&next.id, next.fire_at_ms);
            if let Some(recurrence) = next.recurrence {
                self.endpoint.emit(SchedulerEvent::Rescheduled {
                    id: next.id.clone(),
                    fire_at_ms: next.fire_at_ms,
                    recurrence,
                });
            }
        }
        if shown {
            self.endpoint.emit(SchedulerEvent::Fired { id: record.id });
        }
        true
    }

    /// Show a descriptor. Returns `true` if the platform displayed it.
    fn show(&mut self, descriptor: &NotificationDescriptor) -> bool {
        let payload = build_payload(descriptor, &self.display_config);
        match self.display.show(&payload) {
            Ok(()) => {
                info!(id = %descriptor.id, kind = %descriptor.kind, "notification fired");
                self.permission_reported = false;
                true
            }
            Err(ChimeError::PermissionDenied) => {
                if self.permission_reported {
                    debug!(id = %descriptor.id, "notification permission still denied");
                } else {
                    warn!(id = %descriptor.id, "notification permission denied; reminders will be dropped");
                    self.permission_reported = true;
                    self.endpoint.emit(SchedulerEvent::PermissionDenied {
                        id: descriptor.id.clone(),
                    });
                }
                false
            }
            Err(e) => {
                warn!(id = %descriptor.id, "failed to display notification: {e}");
                false
            }
        }
    }

    /// Make the timer for `id` match whatever the store now holds.
    fn resync(&mut self, id: &str) {
        match self.store.get(id) {
            Ok(Some(current)) => self.arm(&current.id, current.fire_at_ms),
            Ok(None) => self.disarm(id),
            Err(e) => warn!(id, "could not re-read schedule: {e}"),
        }
    }

    fn arm(&mut self, id: &str, fire_at_ms: i64) {
        self.disarm(id);
        self.next_generation += 1;
        let generation = self.next_generation;

        let handle = tokio::spawn(wait_until(
            id.to_owned(),
            generation,
            fire_at_ms,
            Arc::clone(&self.clock),
            self.max_timer_slice,
            self.expired_tx.clone(),
        ));
        debug!(id, fire_at_ms, "timer armed");
        self.timers.insert(
            id.to_owned(),
            LiveTimer {
                generation,
                fire_at_ms,
                handle,
            },
        );
    }

    fn disarm(&mut self, id: &str) {
        if let Some(timer) = self.timers.remove(id) {
            timer.handle.abort();
            debug!(id, "timer disarmed");
        }
    }
}

/// Sleep in slices until the wall clock reaches `fire_at_ms`.
async fn wait_until(
    id: String,
    generation: u64,
    fire_at_ms: i64,
    clock: Arc<dyn Clock>,
    max_slice: Duration,
    expired_tx: mpsc::UnboundedSender<TimerExpired>,
) {
    loop {
        let remaining = fire_at_ms.saturating_sub(clock.now_ms());
        if remaining <= 0 {
            break;
        }
        let wait = Duration::from_millis(u64::try_from(remaining).unwrap_or(0)).min(max_slice);
        tokio::time::sleep(wait).await;
    }
    let _ = expired_tx.send(TimerExpired { id, generation });
}

fn duration_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::host::channel::{BackgroundLink, link};
    use crate::notification::{NotificationKind, RecordingDisplay};
    use crate::scheduler::clock::now_epoch_millis;
    use crate::scheduler::record::{DAILY_CHECKIN_ID, Recurrence};
    use crate::scheduler::recurrence::TimeOfDay;
    use crate::store::MemoryScheduleStore;
    use tokio::sync::broadcast;

    struct Harness {
        scheduler: BackgroundScheduler,
        link: BackgroundLink,
        store: Arc<MemoryScheduleStore>,
        display: Arc<RecordingDisplay>,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryScheduleStore::new());
        let display = Arc::new(RecordingDisplay::new());
        let (link, endpoint) = link(16, 64);
        let scheduler = BackgroundScheduler::new(store.clone(), display.clone(), endpoint);
        Harness {
            scheduler,
            link,
            store,
            display,
        }
    }

    fn one_shot(id: &str, fire_at_ms: i64) -> ScheduleRecord {
        ScheduleRecord::one_shot(
            NotificationDescriptor::new(id, NotificationKind::task_reminder(), "Reminder", "Do it")
                .with_task_id(id),
            fire_at_ms,
        )
    }

    fn checkin(fire_at_ms: i64) -> ScheduleRecord {
        ScheduleRecord::recurring(
            NotificationDescriptor::new(
                DAILY_CHECKIN_ID,
                NotificationKind::MorningCheckin,
                "Good morning",
                "Plan your day",
            ),
            fire_at_ms,
            Recurrence::Daily {
                time_of_day: TimeOfDay::new(8, 0).unwrap(),
            },
        )
    }

    async fn next_event(events: &mut broadcast::Receiver<SchedulerEvent>) -> SchedulerEvent {
        tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("event within timeout")
            .expect("event channel open")
    }

    #[tokio::test]
    async fn scheduled_one_shot_fires_once_and_is_deleted() {
        let h = harness();
        let mut events = h.link.subscribe();
        let _task = h.scheduler.run();

        let record = one_shot("task-1", now_epoch_millis() + 50);
        h.store.put(&record).unwrap();
        h.link.try_send(SchedulerCommand::Schedule(record.clone())).unwrap();

        assert_eq!(
            next_event(&mut events).await,
            SchedulerEvent::Scheduled {
                id: "task-1".to_owned(),
                fire_at_ms: record.fire_at_ms
            }
        );
        assert_eq!(
            next_event(&mut events).await,
            SchedulerEvent::Fired { id: "task-1".to_owned() }
        );

        let shown = h.display.shown();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].tag, "task-1");
        assert_eq!(shown[0].data.url.as_deref(), Some("/"));
        assert!(h.store.get("task-1").unwrap().is_none());
    }

    #[tokio::test]
    async fn cancel_before_fire_prevents_display() {
        let h = harness();
        let mut events = h.link.subscribe();
        let _task = h.scheduler.run();

        let record = one_shot("task-2", now_epoch_millis() + 100);
        h.store.put(&record).unwrap();
        h.link.try_send(SchedulerCommand::Schedule(record)).unwrap();
        next_event(&mut events).await;

        h.store.delete("task-2").unwrap();
        h.link
            .try_send(SchedulerCommand::Cancel { id: "task-2".to_owned() })
            .unwrap();

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(h.display.shown().is_empty());
    }

    #[tokio::test]
    async fn cancel_of_unknown_id_is_a_no_op() {
        let mut h = harness();
        h.scheduler.handle_cancel("never-scheduled");
        h.scheduler.handle_cancel("never-scheduled");
        assert!(h.scheduler.armed_ids().is_empty());
    }

    #[tokio::test]
    async fn schedule_arms_the_stored_value_not_the_message() {
        let mut h = harness();
        let stale = one_shot("task-3", now_epoch_millis() + 60_000);
        let current = one_shot("task-3", now_epoch_millis() + 120_000);
        h.store.put(&current).unwrap();

        h.scheduler.handle_schedule(stale);
        assert_eq!(h.scheduler.armed_fire_at("task-3"), Some(current.fire_at_ms));
    }

    #[tokio::test]
    async fn schedule_for_cancelled_record_does_not_arm() {
        let mut h = harness();
        h.scheduler
            .handle_schedule(one_shot("gone", now_epoch_millis() + 60_000));
        assert!(h.scheduler.armed_ids().is_empty());
    }

    #[tokio::test]
    async fn replaced_schedule_fires_at_new_time_only() {
        let h = harness();
        let mut events = h.link.subscribe();
        let _task = h.scheduler.run();

        let early = one_shot("task-4", now_epoch_millis() + 80);
        h.store.put(&early).unwrap();
        h.link.try_send(SchedulerCommand::Schedule(early)).unwrap();

        let later = one_shot("task-4", now_epoch_millis() + 3_600_000);
        h.store.put(&later).unwrap();
        h.link.try_send(SchedulerCommand::Schedule(later.clone())).unwrap();

        next_event(&mut events).await;
        assert_eq!(
            next_event(&mut events).await,
            SchedulerEvent::Scheduled {
                id: "task-4".to_owned(),
                fire_at_ms: later.fire_at_ms
            }
        );
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(h.display.shown().is_empty());
        assert_eq!(h.store.get("task-4").unwrap(), Some(later));
    }

    #[tokio::test]
    async fn expiry_after_silent_replace_re_arms_instead_of_firing() {
        let h = harness();
        let mut events = h.link.subscribe();
        let _task = h.scheduler.run();

        let soon = one_shot("task-5", now_epoch_millis() + 50);
        h.store.put(&soon).unwrap();
        h.link.try_send(SchedulerCommand::Schedule(soon)).unwrap();
        next_event(&mut events).await;

        // Another context replaces the record without telling us.
        let later = one_shot("task-5", now_epoch_millis() + 3_600_000);
        h.store.put(&later).unwrap();

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(h.display.shown().is_empty());
        assert_eq!(h.store.get("task-5").unwrap(), Some(later));
    }

    #[tokio::test]
    async fn recovery_fires_overdue_checkin_once_and_advances() {
        let mut h = harness();
        let now = now_epoch_millis();
        h.store.put(&checkin(now - 3_600_000)).unwrap();

        let report = h.scheduler.recover().unwrap();
        assert_eq!(report.fired, vec![DAILY_CHECKIN_ID.to_owned()]);
        assert_eq!(h.display.shown().len(), 1);

        let advanced = h.store.get(DAILY_CHECKIN_ID).unwrap().unwrap();
        assert!(advanced.fire_at_ms >= now);
        assert_eq!(h.scheduler.armed_fire_at(DAILY_CHECKIN_ID), Some(advanced.fire_at_ms));
    }

    #[tokio::test]
    async fn fire_loses_to_an_earlier_advance() {
        let mut h = harness();
        let now = now_epoch_millis();
        let overdue = checkin(now - 3_600_000);
        h.store.put(&overdue).unwrap();

        // The foreground reconciles first.
        let next = overdue.next_occurrence(now).unwrap();
        assert!(h.store.advance_if_current(&overdue, &next).unwrap());

        assert!(!h.scheduler.fire(overdue));
        assert!(h.display.shown().is_empty());
        assert_eq!(h.scheduler.armed_fire_at(DAILY_CHECKIN_ID), Some(next.fire_at_ms));
    }

    #[tokio::test]
    async fn recovery_drops_missed_one_shot_without_display() {
        let mut h = harness();
        h.store.put(&one_shot("late", now_epoch_millis() - 60_000)).unwrap();

        let report = h.scheduler.recover().unwrap();
        assert_eq!(report.missed, vec!["late".to_owned()]);
        assert!(h.display.shown().is_empty());
        assert!(h.store.list_all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn recovery_re_arms_future_records_with_remaining_delay() {
        let mut h = harness();
        let fire_at = now_epoch_millis() + 600_000;
        h.store.put(&one_shot("future", fire_at)).unwrap();

        let report = h.scheduler.recover().unwrap();
        assert_eq!(report.armed, vec!["future".to_owned()]);
        assert_eq!(h.scheduler.armed_fire_at("future"), Some(fire_at));
        assert!(h.display.shown().is_empty());
    }

    #[tokio::test]
    async fn recovery_skips_ids_with_live_timers() {
        let mut h = harness();
        let record = one_shot("live", now_epoch_millis() + 600_000);
        h.store.put(&record).unwrap();
        h.scheduler.handle_schedule(record);

        let report = h.scheduler.recover().unwrap();
        assert_eq!(report.skipped, vec!["live".to_owned()]);
        assert!(report.armed.is_empty());
    }

    #[tokio::test]
    async fn recovery_is_idempotent_across_restarts() {
        let h = harness();
        let now = now_epoch_millis();
        h.store.put(&checkin(now - 3_600_000)).unwrap();
        h.store.put(&one_shot("late", now - 1_000)).unwrap();

        let mut first = h.scheduler;
        first.recover().unwrap();
        drop(first);

        let (_link, endpoint) = link(4, 4);
        let mut second = BackgroundScheduler::new(h.store.clone(), h.display.clone(), endpoint);
        let report = second.recover().unwrap();

        assert!(report.fired.is_empty());
        assert!(report.missed.is_empty());
        assert_eq!(report.armed, vec![DAILY_CHECKIN_ID.to_owned()]);
        assert_eq!(h.display.shown().len(), 1);
    }

    #[tokio::test]
    async fn permission_denied_is_reported_once_and_records_retire() {
        let mut h = harness();
        let mut events = h.link.subscribe();
        h.display.deny_permission(true);
        let now = now_epoch_millis();
        h.store.put(&checkin(now - 1_000)).unwrap();
        let first = one_shot("a", now + 600_000);
        h.store.put(&first).unwrap();

        h.scheduler.recover().unwrap();
        assert!(h.scheduler.fire(first));

        assert_eq!(
            next_event(&mut events).await,
            SchedulerEvent::PermissionDenied {
                id: DAILY_CHECKIN_ID.to_owned()
            }
        );
        // Only the reschedule follows; no second denial, no FIRED.
        assert!(matches!(
            next_event(&mut events).await,
            SchedulerEvent::Rescheduled { .. }
        ));
        assert!(events.try_recv().is_err());

        assert!(h.store.get("a").unwrap().is_none());
        assert!(h.store.get(DAILY_CHECKIN_ID).unwrap().unwrap().fire_at_ms > now);
    }

    #[tokio::test]
    async fn cancel_followed_by_schedule_stays_armed() {
        let mut h = harness();
        let record = one_shot("task-1", now_epoch_millis() + 600_000);
        h.store.put(&record).unwrap();

        // CANCEL arrives after the store already holds the re-scheduled record.
        h.scheduler.handle_cancel("task-1");
        assert_eq!(h.scheduler.armed_fire_at("task-1"), Some(record.fire_at_ms));

        h.scheduler.handle_schedule(record.clone());
        assert_eq!(h.scheduler.armed_ids(), vec!["task-1".to_owned()]);
        assert_eq!(h.scheduler.armed_fire_at("task-1"), Some(record.fire_at_ms));
    }

    #[tokio::test]
    async fn wall_clock_jump_fires_within_one_slice() {
        let Harness {
            scheduler,
            link,
            store,
            display,
        } = harness();
        let start = now_epoch_millis();
        let clock = Arc::new(crate::scheduler::clock::ManualClock::new(start));
        let mut scheduler = scheduler.with_clock(clock.clone());
        scheduler.max_timer_slice = Duration::from_millis(20);
        let mut events = link.subscribe();
        let _task = scheduler.run();

        let record = one_shot("suspended", start + 3_600_000);
        store.put(&record).unwrap();
        link.try_send(SchedulerCommand::Schedule(record)).unwrap();
        assert!(matches!(
            next_event(&mut events).await,
            SchedulerEvent::Scheduled { .. }
        ));
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(display.shown().is_empty());

        // Host wakes from suspend an hour later.
        clock.advance_ms(3_600_000);
        assert_eq!(
            next_event(&mut events).await,
            SchedulerEvent::Fired {
                id: "suspended".to_owned()
            }
        );
        assert_eq!(display.shown().len(), 1);
    }

    #[tokio::test]
    async fn interaction_closes_then_reports_action() {
        let h = harness();
        let mut events = h.link.subscribe();
        let _task = h.scheduler.run();

        let descriptor = checkin(0).descriptor;
        h.link
            .try_send(SchedulerCommand::Interaction {
                notification: descriptor.clone(),
                action: Some("snooze".to_owned()),
            })
            .unwrap();

        match next_event(&mut events).await {
            SchedulerEvent::Action {
                kind,
                action_id,
                notification,
                ..
            } => {
                assert_eq!(kind, NotificationKind::MorningCheckin);
                assert_eq!(action_id.as_deref(), Some("snooze"));
                assert_eq!(notification, descriptor);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(h.display.closed(), vec![DAILY_CHECKIN_ID.to_owned()]);
    }

    #[tokio::test]
    async fn show_now_bypasses_the_store() {
        let h = harness();
        let mut events = h.link.subscribe();
        let _task = h.scheduler.run();

        let descriptor = checkin(0).descriptor;
        h.link
            .try_send(SchedulerCommand::ShowNow { descriptor })
            .unwrap();
        assert_eq!(
            next_event(&mut events).await,
            SchedulerEvent::Fired {
                id: DAILY_CHECKIN_ID.to_owned()
            }
        );
        assert!(h.store.list_all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn loop_exits_when_links_are_dropped() {
        let h = harness();
        let task = h.scheduler.run();
        drop(h.link);
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("loop exits")
            .expect("task did not panic");
    }
}
