//! Stdin/stdout JSON bridge over the reminder API.
//!
//! Reads newline-delimited JSON [`RequestEnvelope`] messages, dispatches
//! them through [`Reminders`], and writes [`ResponseEnvelope`] and
//! [`EventEnvelope`] messages as newline-delimited JSON.
//!
//! Stdout is exclusively reserved for the JSON protocol; all diagnostic
//! output (tracing, logs) must be routed to stderr.

use crate::error::{ChimeError, Result};
use crate::host::contract::{EventEnvelope, PROTOCOL_VERSION, ResponseEnvelope};
use crate::host::reminders::Reminders;
use crate::notification::NotificationDescriptor;
use crate::scheduler::controller::Confirmation;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::Mutex;
use tokio::sync::broadcast::error::RecvError;

/// One request line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub v: u32,
    pub request_id: String,
    pub request: BridgeRequest,
}

impl RequestEnvelope {
    #[must_use]
    pub fn new(request_id: impl Into<String>, request: BridgeRequest) -> Self {
        Self {
            v: PROTOCOL_VERSION,
            request_id: request_id.into(),
            request,
        }
    }

    /// Validate envelope version and required identifiers.
    pub fn validate(&self) -> Result<()> {
        if self.v != PROTOCOL_VERSION {
            return Err(ChimeError::Serialization(format!(
                "unsupported contract version {}; expected {PROTOCOL_VERSION}",
                self.v
            )));
        }
        if self.request_id.trim().is_empty() {
            return Err(ChimeError::Serialization(
                "request_id cannot be empty".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Operations available over the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BridgeRequest {
    RequestReminder {
        task_id: String,
        title: String,
        body: String,
        fire_at_ms: i64,
    },
    CancelReminder {
        task_id: String,
    },
    EnableDailyCheckin {
        time_of_day: String,
        /// Falls back to the configured template.
        #[serde(default)]
        message_template: Option<String>,
    },
    DisableDailyCheckin,
    /// A platform click on a displayed notification.
    Interact {
        notification: NotificationDescriptor,
        #[serde(default)]
        action: Option<String>,
    },
    List,
}

type SharedWriter<W> = Arc<Mutex<BufWriter<W>>>;

/// Run the bridge on the process's stdin and stdout until stdin closes.
pub async fn run_stdio_bridge(reminders: Arc<Reminders>, checkin_template: String) -> Result<()> {
    run_bridge(
        reminders,
        checkin_template,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await
}

/// Run the bridge over arbitrary streams until `input` reaches EOF.
///
/// Background events are forwarded to `output` concurrently with responses.
pub async fn run_bridge<R, W>(
    reminders: Arc<Reminders>,
    checkin_template: String,
    input: R,
    output: W,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let writer: SharedWriter<W> = Arc::new(Mutex::new(BufWriter::new(output)));

    let event_writer = Arc::clone(&writer);
    let mut event_rx = reminders.controller().subscribe();
    let event_handle = tokio::spawn(async move {
        loop {
            match event_rx.recv().await {
                Ok(event) => match serde_json::to_string(&EventEnvelope::new(event)) {
                    Ok(json) => {
                        let mut w = event_writer.lock().await;
                        if let Err(e) = write_line(&mut w, &json).await {
                            tracing::warn!(
                                error = %e,
                                "failed to write event envelope; stopping event forwarder"
                            );
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "failed to serialize event envelope; skipping");
                    }
                },
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, "event forwarder lagged; some events were dropped");
                }
                Err(RecvError::Closed) => {
                    tracing::info!("event channel closed; stopping event forwarder");
                    break;
                }
            }
        }
    });

    let reader_result = run_reader(&reminders, &checkin_template, input, &writer).await;

    event_handle.abort();
    let _ = event_handle.await;
    reader_result
}

async fn run_reader<R, W>(
    reminders: &Reminders,
    checkin_template: &str,
    mut input: R,
    writer: &SharedWriter<W>,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        let bytes_read = input
            .read_line(&mut line)
            .await
            .map_err(|e| ChimeError::Channel(format!("failed to read request line: {e}")))?;
        if bytes_read == 0 {
            tracing::info!("input closed (EOF); shutting down bridge");
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<RequestEnvelope>(trimmed) {
            Ok(envelope) => match envelope.validate() {
                Ok(()) => dispatch(reminders, checkin_template, envelope).await,
                Err(e) => ResponseEnvelope::error(envelope.request_id, e.to_string()),
            },
            Err(e) => {
                tracing::warn!(error = %e, raw_line = %trimmed, "failed to parse request envelope");
                ResponseEnvelope::error("parse-error", format!("failed to parse request envelope: {e}"))
            }
        };

        let json = serde_json::to_string(&response)?;
        let mut w = writer.lock().await;
        write_line(&mut w, &json).await?;
    }
    Ok(())
}

async fn dispatch(
    reminders: &Reminders,
    checkin_template: &str,
    envelope: RequestEnvelope,
) -> ResponseEnvelope {
    let request_id = envelope.request_id;
    let result = match envelope.request {
        BridgeRequest::RequestReminder {
            task_id,
            title,
            body,
            fire_at_ms,
        } => {
            let outcome = reminders
                .request_reminder(&task_id, &title, &body, fire_at_ms)
                .await;
            confirmation_payload(&task_id, outcome)
        }
        BridgeRequest::CancelReminder { task_id } => reminders
            .cancel_reminder(&task_id)
            .map(|()| json!({"cancelled": task_id})),
        BridgeRequest::EnableDailyCheckin {
            time_of_day,
            message_template,
        } => {
            let template = message_template.unwrap_or_else(|| checkin_template.to_owned());
            let outcome = reminders.enable_daily_checkin(&time_of_day, &template).await;
            confirmation_payload(crate::scheduler::DAILY_CHECKIN_ID, outcome)
        }
        BridgeRequest::DisableDailyCheckin => reminders
            .disable_daily_checkin()
            .map(|()| json!({"cancelled": crate::scheduler::DAILY_CHECKIN_ID})),
        BridgeRequest::Interact {
            notification,
            action,
        } => reminders
            .controller()
            .report_interaction(notification, action)
            .map(|()| json!({"accepted": true})),
        BridgeRequest::List => reminders
            .list()
            .and_then(|records| Ok(json!({"schedules": serde_json::to_value(records)?}))),
    };

    match result {
        Ok(payload) => ResponseEnvelope::ok(request_id, payload),
        Err(e) => {
            tracing::warn!(request_id, "request failed: {e}");
            ResponseEnvelope::error(request_id, e.to_string())
        }
    }
}

/// A stored-but-unconfirmed schedule is still a success on the wire.
fn confirmation_payload(id: &str, outcome: Result<Confirmation>) -> Result<serde_json::Value> {
    match outcome {
        Ok(Confirmation::Acknowledged { fire_at_ms }) => {
            Ok(json!({"id": id, "status": "acknowledged", "fire_at_ms": fire_at_ms}))
        }
        Ok(Confirmation::Superseded) => Ok(json!({"id": id, "status": "superseded"})),
        Err(ChimeError::DeliveryUncertain { reason, .. }) => {
            Ok(json!({"id": id, "status": "uncertain", "reason": reason}))
        }
        Err(e) => Err(e),
    }
}

/// Write a single JSON line to the buffered writer and flush.
async fn write_line<W: AsyncWrite + Unpin>(writer: &mut BufWriter<W>, json: &str) -> Result<()> {
    writer
        .write_all(json.as_bytes())
        .await
        .map_err(|e| ChimeError::Channel(format!("failed to write output: {e}")))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| ChimeError::Channel(format!("failed to write newline: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| ChimeError::Channel(format!("failed to flush output: {e}")))?;
    Ok(())
}
