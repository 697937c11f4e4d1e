//! Headless reminder host.
//!
//! Runs the foreground controller and the background scheduler in one
//! process over the SQLite store, and exposes the reminder API as
//! newline-delimited JSON on stdin/stdout.
//!
//! All tracing/diagnostic output goes to stderr (and a daily log file) so
//! that stdout remains a clean JSON protocol channel.

use anyhow::Context;
use chime::config::ChimeConfig;
use chime::host::channel::link;
use chime::host::reminders::Reminders;
use chime::host::router::ActionRouter;
use chime::host::stdio::run_stdio_bridge;
use chime::notification::{LogDisplay, NotificationDisplay};
use chime::scheduler::{BackgroundScheduler, ScheduleController};
use chime::store::{ScheduleStore, SqliteScheduleStore};
use chime::{ChimeError, chime_dirs};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(ChimeConfig::default_config_path);
    let config = ChimeConfig::load_or_default(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    let logs_dir = chime_dirs::logs_dir();
    std::fs::create_dir_all(&logs_dir)
        .with_context(|| format!("failed to create log directory {}", logs_dir.display()))?;
    let (file_writer, _log_guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(&logs_dir, "chime-host.log"));
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chime=info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    tracing::info!(config = %config_path.display(), "chime-host starting");

    let store_path = config.store.resolved_path();
    let store: Arc<dyn ScheduleStore> = Arc::new(
        SqliteScheduleStore::open(&store_path)
            .with_context(|| format!("failed to open schedule store {}", store_path.display()))?,
    );
    let display: Arc<dyn NotificationDisplay> = Arc::new(LogDisplay);

    let (link, endpoint) = link(
        config.delivery.command_capacity,
        config.delivery.event_capacity,
    );
    let background = BackgroundScheduler::new(Arc::clone(&store), display, endpoint)
        .with_display_config(config.display.clone())
        .with_delivery_config(&config.delivery)
        .run();

    let controller = Arc::new(ScheduleController::new(
        Arc::clone(&store),
        link,
        &config.delivery,
    ));
    match controller.reconcile() {
        Ok(report) => tracing::info!(
            advanced = report.advanced.len(),
            announced = report.announced.len(),
            "foreground reconciliation complete"
        ),
        Err(e) => tracing::error!(error = %e, "foreground reconciliation failed"),
    }

    let reminders = Arc::new(Reminders::new(
        controller,
        store,
        ActionRouter::from_config(&config),
    ));
    reminders.on_notification_action(|action| {
        tracing::info!(
            id = %action.notification.id,
            intent = action.intent.name(),
            "notification action"
        );
    });
    let listener = Arc::clone(&reminders).listen();

    if config.checkin.enabled {
        match reminders
            .enable_daily_checkin(&config.checkin.time_of_day, &config.checkin.message_template)
            .await
        {
            Ok(_) | Err(ChimeError::DeliveryUncertain { .. }) => {}
            Err(e) => tracing::warn!(error = %e, "daily check-in not enabled"),
        }
    }

    let bridge_result =
        run_stdio_bridge(Arc::clone(&reminders), config.checkin.message_template.clone()).await;

    // Dropping the last link stops the background loop.
    listener.abort();
    let _ = listener.await;
    drop(reminders);
    let _ = background.await;

    bridge_result.map_err(|e| {
        tracing::error!(error = %e, "chime-host exited with error");
        anyhow::anyhow!("chime-host failed: {e}")
    })?;

    tracing::info!("chime-host shut down cleanly");
    Ok(())
}
