//! Collaborator-facing reminder API.
//!
//! [`Reminders`] is the seam the rest of an application uses: request or
//! cancel a task reminder, toggle the daily check-in, and observe what the
//! user did with a notification. It also carries out the intents that need
//! foreground state (snoozing, engagement bookkeeping) before handing them to
//! registered handlers.

use crate::error::{ChimeError, Result};
use crate::host::contract::SchedulerEvent;
use crate::host::router::{ActionRouter, Intent};
use crate::notification::{NotificationDescriptor, NotificationKind};
use crate::scheduler::clock::{Clock, SystemClock};
use crate::scheduler::controller::{Confirmation, ScheduleController};
use crate::scheduler::record::ScheduleRecord;
use crate::scheduler::recurrence::TimeOfDay;
use crate::store::{Engagement, ScheduleStore};
use chrono::{Local, NaiveDate, TimeZone};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A resolved user interaction, as delivered to handlers.
#[derive(Debug, Clone, PartialEq)]
pub struct ReminderAction {
    pub intent: Intent,
    pub notification: NotificationDescriptor,
    /// Button id, `None` for a body tap.
    pub action_id: Option<String>,
}

type ActionHandler = Arc<dyn Fn(&ReminderAction) + Send + Sync>;

/// Foreground facade over [`ScheduleController`] and [`ActionRouter`].
pub struct Reminders {
    controller: Arc<ScheduleController>,
    store: Arc<dyn ScheduleStore>,
    router: ActionRouter,
    clock: Arc<dyn Clock>,
    handlers: RwLock<Vec<ActionHandler>>,
}

impl Reminders {
    pub fn new(
        controller: Arc<ScheduleController>,
        store: Arc<dyn ScheduleStore>,
        router: ActionRouter,
    ) -> Self {
        Self {
            controller,
            store,
            router,
            clock: Arc::new(SystemClock),
            handlers: RwLock::new(Vec::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn controller(&self) -> &Arc<ScheduleController> {
        &self.controller
    }

    /// Remind about `task_id` at `fire_at_ms`. The task id is the schedule id,
    /// so asking again moves the existing reminder.
    pub async fn request_reminder(
        &self,
        task_id: &str,
        title: &str,
        body: &str,
        fire_at_ms: i64,
    ) -> Result<Confirmation> {
        let descriptor =
            NotificationDescriptor::new(task_id, NotificationKind::task_reminder(), title, body)
                .with_task_id(task_id)
                .with_url(format!("/tasks/{task_id}"));
        self.controller.schedule_one_shot(descriptor, fire_at_ms).await
    }

    pub fn cancel_reminder(&self, task_id: &str) -> Result<()> {
        self.controller.cancel(task_id)
    }

    /// Enable the daily check-in at `time_of_day` (`"HH:MM"`, local time).
    pub async fn enable_daily_checkin(
        &self,
        time_of_day: &str,
        message_template: &str,
    ) -> Result<Confirmation> {
        let time_of_day = TimeOfDay::parse(time_of_day)?;
        self.controller
            .schedule_daily_checkin(time_of_day, message_template)
            .await
    }

    pub fn disable_daily_checkin(&self) -> Result<()> {
        self.controller.disable_daily_checkin()
    }

    /// Every outstanding schedule, soonest first.
    pub fn list(&self) -> Result<Vec<ScheduleRecord>> {
        self.store.list_all()
    }

    /// Engagements recorded for the current local day.
    pub fn engagements_today(&self) -> Result<Vec<Engagement>> {
        self.store.engagements_on(local_day(self.clock.now_ms()))
    }

    /// Register a handler for resolved interactions. Handlers run in
    /// registration order after the intent's own side effects.
    pub fn on_notification_action<F>(&self, handler: F)
    where
        F: Fn(&ReminderAction) + Send + Sync + 'static,
    {
        match self.handlers.write() {
            Ok(mut handlers) => handlers.push(Arc::new(handler)),
            Err(e) => warn!("action handler registry poisoned: {e}"),
        }
    }

    /// React to a background event. Only `ACTION` events produce an intent.
    pub async fn handle_event(&self, event: &SchedulerEvent) -> Option<ReminderAction> {
        let SchedulerEvent::Action {
            action_id,
            notification,
            ..
        } = event
        else {
            return None;
        };

        let intent = self.router.resolve(notification, action_id.as_deref());
        debug!(id = %notification.id, intent = intent.name(), "interaction resolved");

        match &intent {
            Intent::Snooze {
                notification,
                delay,
            } => match self.controller.snooze(notification, *delay).await {
                Ok(_) | Err(ChimeError::DeliveryUncertain { .. }) => {}
                Err(e) => warn!(id = %notification.id, "snooze failed: {e}"),
            },
            Intent::OpenAndAck { kind, .. } => self.acknowledge(notification, kind),
            Intent::Open { .. } | Intent::Dismiss | Intent::StartTask { .. } => {}
        }

        let action = ReminderAction {
            intent,
            notification: notification.clone(),
            action_id: action_id.clone(),
        };
        self.dispatch(&action);
        Some(action)
    }

    /// Consume background events until the channel closes.
    pub fn listen(self: Arc<Self>) -> JoinHandle<()> {
        let mut events = self.controller.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        self.handle_event(&event).await;
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!(lagged = n, "reminder listener lagged; some actions were dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    fn acknowledge(&self, notification: &NotificationDescriptor, kind: &NotificationKind) {
        let now = self.clock.now_ms();
        let engagement = Engagement {
            day: local_day(now),
            notification_id: notification.id.clone(),
            kind: kind.to_string(),
            at_ms: now,
        };
        match self.store.record_engagement(&engagement) {
            Ok(()) => info!(id = %notification.id, day = %engagement.day, "engagement recorded"),
            Err(e) => warn!(id = %notification.id, "failed to record engagement: {e}"),
        }
    }

    fn dispatch(&self, action: &ReminderAction) {
        let handlers: Vec<ActionHandler> = match self.handlers.read() {
            Ok(handlers) => handlers.clone(),
            Err(e) => {
                warn!("action handler registry poisoned: {e}");
                return;
            }
        };
        for handler in handlers {
            handler(action);
        }
    }
}

fn local_day(now_ms: i64) -> NaiveDate {
    Local
        .timestamp_millis_opt(now_ms)
        .earliest()
        .map(|dt| dt.date_naive())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::config::DeliveryConfig;
    use crate::host::channel::link;
    use crate::notification::RecordingDisplay;
    use crate::scheduler::background::BackgroundScheduler;
    use crate::scheduler::clock::now_epoch_millis;
    use crate::scheduler::record::{DAILY_CHECKIN_ID, Recurrence, snooze_id};
    use crate::store::MemoryScheduleStore;
    use std::sync::Mutex;
    use std::time::Duration;

    fn reminders() -> (Reminders, Arc<MemoryScheduleStore>) {
        let store = Arc::new(MemoryScheduleStore::new());
        let display = Arc::new(RecordingDisplay::new());
        let (link, endpoint) = link(16, 64);
        let delivery = DeliveryConfig {
            ack_timeout_ms: 500,
            ..DeliveryConfig::default()
        };
        let _task = BackgroundScheduler::new(store.clone(), display, endpoint).run();
        let controller = Arc::new(ScheduleController::new(store.clone(), link, &delivery));
        let reminders = Reminders::new(controller, store.clone(), ActionRouter::default());
        (reminders, store)
    }

    fn action(notification: NotificationDescriptor, action_id: Option<&str>) -> SchedulerEvent {
        SchedulerEvent::Action {
            kind: notification.kind.clone(),
            action_id: action_id.map(str::to_owned),
            data: notification.data.clone(),
            notification,
        }
    }

    #[tokio::test]
    async fn request_reminder_keys_by_task_id() {
        let (reminders, store) = reminders();
        let fire_at = now_epoch_millis() + 3_600_000;
        reminders
            .request_reminder("task-42", "Write report", "Due today", fire_at)
            .await
            .unwrap();

        let record = store.get("task-42").unwrap().unwrap();
        assert_eq!(record.descriptor.kind.as_str(), "task-reminder");
        assert_eq!(record.descriptor.data.task_id.as_deref(), Some("task-42"));
        assert_eq!(record.descriptor.data.url.as_deref(), Some("/tasks/task-42"));

        reminders.cancel_reminder("task-42").unwrap();
        assert!(reminders.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn enable_daily_checkin_rejects_bad_times() {
        let (reminders, store) = reminders();
        let err = reminders
            .enable_daily_checkin("25:00", "Plan your day")
            .await
            .unwrap_err();
        assert!(matches!(err, ChimeError::InvalidSchedule(_)));
        assert!(store.list_all().unwrap().is_empty());

        reminders
            .enable_daily_checkin("08:00", "Plan your day")
            .await
            .unwrap();
        assert!(store.get(DAILY_CHECKIN_ID).unwrap().unwrap().is_recurring());
    }

    #[tokio::test]
    async fn snooze_action_on_checkin_creates_snoozed_copy() {
        let (reminders, store) = reminders();
        reminders
            .enable_daily_checkin("08:00", "Plan your day")
            .await
            .unwrap();
        let fired = store.get(DAILY_CHECKIN_ID).unwrap().unwrap();

        let before = now_epoch_millis();
        let resolved = reminders
            .handle_event(&action(fired.descriptor.clone(), Some("snooze")))
            .await
            .unwrap();
        assert_eq!(resolved.intent.name(), "snooze");

        let snoozed = store.get(&snooze_id(DAILY_CHECKIN_ID)).unwrap().unwrap();
        let thirty_min = 30 * 60 * 1_000;
        assert!(snoozed.fire_at_ms >= before + thirty_min);
        assert!(snoozed.fire_at_ms <= now_epoch_millis() + thirty_min);
        assert_eq!(snoozed.descriptor.body, "Plan your day (snoozed)");
        assert_eq!(
            store.get(DAILY_CHECKIN_ID).unwrap().unwrap().recurrence,
            Some(Recurrence::Daily {
                time_of_day: TimeOfDay::new(8, 0).unwrap()
            })
        );
    }

    #[tokio::test]
    async fn checkin_action_records_engagement_once_per_day() {
        let (reminders, _store) = reminders();
        let checkin = NotificationDescriptor::new(
            DAILY_CHECKIN_ID,
            NotificationKind::MorningCheckin,
            "Good morning",
            "Plan your day",
        );

        reminders
            .handle_event(&action(checkin.clone(), Some("checkin")))
            .await
            .unwrap();
        reminders
            .handle_event(&action(checkin, Some("checkin")))
            .await
            .unwrap();

        let today = reminders.engagements_today().unwrap();
        assert_eq!(today.len(), 1);
        assert_eq!(today[0].kind, "morning_checkin");
    }

    #[tokio::test]
    async fn handlers_receive_resolved_actions() {
        let (reminders, _store) = reminders();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        reminders.on_notification_action(move |action| {
            sink.lock().unwrap().push(action.intent.clone());
        });

        let descriptor =
            NotificationDescriptor::new("task-1", NotificationKind::task_reminder(), "T", "B")
                .with_url("/tasks/task-1");
        reminders.handle_event(&action(descriptor, None)).await;
        reminders
            .handle_event(&SchedulerEvent::Fired { id: "task-1".to_owned() })
            .await;

        assert_eq!(
            *seen.lock().unwrap(),
            vec![Intent::Open {
                url: "/tasks/task-1".to_owned()
            }]
        );
    }

    #[tokio::test]
    async fn listener_routes_platform_clicks_end_to_end() {
        let (reminders, store) = reminders();
        let reminders = Arc::new(reminders);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        reminders.on_notification_action(move |action| {
            sink.lock().unwrap().push(action.intent.name());
        });
        let _listener = Arc::clone(&reminders).listen();

        let descriptor =
            NotificationDescriptor::new("task-9", NotificationKind::FrogReminder, "Frog", "Eat it");
        reminders
            .controller()
            .report_interaction(descriptor, Some("snooze".to_owned()))
            .unwrap();

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(*seen.lock().unwrap(), vec!["snooze"]);
        assert!(store.get("task-9").unwrap().is_some());
    }
}
