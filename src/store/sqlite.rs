//! SQLite-backed schedule store.
//!
//! One database file is opened independently by every context that needs
//! it; WAL mode plus a busy timeout lets them read and write concurrently
//! without a server. Each statement is atomic, so readers never see a
//! half-written record.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use tracing::debug;

use super::schema::{apply_schema, read_schema_version};
use super::{Engagement, ScheduleStore};
use crate::error::{ChimeError, Result};
use crate::scheduler::clock::now_epoch_millis;
use crate::scheduler::record::{Recurrence, ScheduleRecord};

/// How long a writer waits for another context's lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const DAY_FORMAT: &str = "%Y-%m-%d";

/// Durable [`ScheduleStore`] backed by a single SQLite file.
pub struct SqliteScheduleStore {
    path: Option<PathBuf>,
    conn: Mutex<Connection>,
}

/// A record serialized to its column values.
struct EncodedRecord {
    descriptor: String,
    recurrence: Option<String>,
}

impl SqliteScheduleStore {
    /// Open (or create) the database at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ChimeError::StoreUnavailable(format!(
                    "cannot create store directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        let conn = Connection::open(path)?;
        let store = Self::from_connection(conn, Some(path.to_path_buf()))?;
        debug!("opened schedule store at {}", path.display());
        Ok(store)
    }

    /// Private in-memory database. Not shared across connections.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, None)
    }

    fn from_connection(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        apply_schema(&conn)?;
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    /// Database file path, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn schema_version(&self) -> Result<Option<u32>> {
        let conn = self.lock()?;
        Ok(read_schema_version(&conn)?)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ChimeError::StoreUnavailable(format!("store lock poisoned: {e}")))
    }
}

fn encode(record: &ScheduleRecord) -> Result<EncodedRecord> {
    Ok(EncodedRecord {
        descriptor: serde_json::to_string(&record.descriptor)?,
        recurrence: record
            .recurrence
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?,
    })
}

fn json_column<T: serde::de::DeserializeOwned>(idx: usize, raw: &str) -> rusqlite::Result<T> {
    serde_json::from_str(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScheduleRecord> {
    let descriptor_json: String = row.get(2)?;
    let recurrence_json: Option<String> = row.get(3)?;
    let recurrence = match recurrence_json {
        Some(raw) => Some(json_column::<Recurrence>(3, &raw)?),
        None => None,
    };
    Ok(ScheduleRecord {
        id: row.get(0)?,
        fire_at_ms: row.get(1)?,
        descriptor: json_column(2, &descriptor_json)?,
        recurrence,
    })
}

fn row_to_engagement(row: &rusqlite::Row<'_>) -> rusqlite::Result<Engagement> {
    let day: String = row.get(0)?;
    let day = NaiveDate::parse_from_str(&day, DAY_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;
    Ok(Engagement {
        day,
        notification_id: row.get(1)?,
        kind: row.get(2)?,
        at_ms: row.get(3)?,
    })
}

/// Whether the row for `expected.id` decodes to exactly `expected`.
///
/// Compared as decoded values: re-encoding is not stable for every float
/// in `data.extra`.
fn holds(tx: &rusqlite::Transaction<'_>, expected: &ScheduleRecord) -> Result<bool> {
    let current = tx
        .query_row(SELECT_ONE_SQL, params![expected.id], row_to_record)
        .optional()?;
    Ok(current.as_ref() == Some(expected))
}

const SELECT_ONE_SQL: &str =
    "SELECT id, fire_at_ms, descriptor, recurrence FROM schedules WHERE id = ?1";

const UPSERT_SQL: &str = "INSERT OR REPLACE INTO schedules \
     (id, fire_at_ms, descriptor, recurrence, updated_at_ms) VALUES (?1, ?2, ?3, ?4, ?5)";

impl ScheduleStore for SqliteScheduleStore {
    fn put(&self, record: &ScheduleRecord) -> Result<()> {
        record.validate()?;
        let encoded = encode(record)?;
        let conn = self.lock()?;
        conn.execute(
            UPSERT_SQL,
            params![
                record.id,
                record.fire_at_ms,
                encoded.descriptor,
                encoded.recurrence,
                now_epoch_millis()
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<ScheduleRecord>> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                SELECT_ONE_SQL,
                params![id],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let changed = conn.execute("DELETE FROM schedules WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    fn list_all(&self) -> Result<Vec<ScheduleRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, fire_at_ms, descriptor, recurrence FROM schedules \
             ORDER BY fire_at_ms ASC, id ASC",
        )?;
        let rows = stmt.query_map([], row_to_record)?;

        let mut records = Vec::new();
        for r in rows {
            records.push(r?);
        }
        Ok(records)
    }

    fn delete_if_current(&self, expected: &ScheduleRecord) -> Result<bool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if !holds(&tx, expected)? {
            return Ok(false);
        }
        tx.execute("DELETE FROM schedules WHERE id = ?1", params![expected.id])?;
        tx.commit()?;
        Ok(true)
    }

    fn advance_if_current(&self, expected: &ScheduleRecord, next: &ScheduleRecord) -> Result<bool> {
        next.validate()?;
        let new = encode(next)?;

        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if !holds(&tx, expected)? {
            return Ok(false);
        }
        tx.execute("DELETE FROM schedules WHERE id = ?1", params![expected.id])?;
        tx.execute(
            UPSERT_SQL,
            params![
                next.id,
                next.fire_at_ms,
                new.descriptor,
                new.recurrence,
                now_epoch_millis()
            ],
        )?;
        tx.commit()?;
        Ok(true)
    }

    fn record_engagement(&self, engagement: &Engagement) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO engagements (day, notification_id, kind, at_ms) \
             VALUES (?1, ?2, ?3, ?4)",
            params![
                engagement.day.format(DAY_FORMAT).to_string(),
                engagement.notification_id,
                engagement.kind,
                engagement.at_ms
            ],
        )?;
        Ok(())
    }

    fn engagements_on(&self, day: NaiveDate) -> Result<Vec<Engagement>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT day, notification_id, kind, at_ms FROM engagements \
             WHERE day = ?1 ORDER BY at_ms ASC",
        )?;
        let rows = stmt.query_map(params![day.format(DAY_FORMAT).to_string()], row_to_engagement)?;

        let mut engagements = Vec::new();
        for r in rows {
            engagements.push(r?);
        }
        Ok(engagements)
    }
}
