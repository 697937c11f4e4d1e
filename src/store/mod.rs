//! Durable schedule storage.
//!
//! The store is the single source of truth for "what should eventually
//! fire". Both execution contexts treat their in-memory timers as caches
//! rebuilt from it.
//!
//! - `sqlite`: [`SqliteScheduleStore`], one database file shared by both contexts.
//! - `memory`: [`MemoryScheduleStore`], process-local, for tests and embedding.

pub mod memory;
pub(crate) mod schema;
pub mod sqlite;

pub use memory::MemoryScheduleStore;
pub use sqlite::SqliteScheduleStore;

use crate::error::Result;
use crate::scheduler::record::ScheduleRecord;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A user engaging with a check-in-style notification on a given local day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Engagement {
    pub day: NaiveDate,
    pub notification_id: String,
    /// Kind tag of the notification that was acknowledged.
    pub kind: String,
    pub at_ms: i64,
}

/// Key-value record of outstanding schedules, keyed by id.
///
/// Every method is atomic per key: a concurrent `list_all` never observes a
/// half-written record.
pub trait ScheduleStore: Send + Sync + 'static {
    /// Insert or replace the record for `record.id`.
    fn put(&self, record: &ScheduleRecord) -> Result<()>;

    fn get(&self, id: &str) -> Result<Option<ScheduleRecord>>;

    /// Remove the record. Returns `true` if one existed.
    fn delete(&self, id: &str) -> Result<bool>;

    /// Every record, ordered by fire time.
    fn list_all(&self) -> Result<Vec<ScheduleRecord>>;

    /// Delete only if the stored record still equals `expected`.
    ///
    /// Keeps a fire from removing a record that was re-scheduled meanwhile.
    fn delete_if_current(&self, expected: &ScheduleRecord) -> Result<bool>;

    /// Replace with `next` only if the stored record still equals `expected`.
    ///
    /// Keeps a fire from resurrecting a cancelled or replaced record.
    fn advance_if_current(&self, expected: &ScheduleRecord, next: &ScheduleRecord) -> Result<bool>;

    /// Record engagement. Repeated engagement on the same day keeps the first.
    fn record_engagement(&self, engagement: &Engagement) -> Result<()>;

    fn engagements_on(&self, day: NaiveDate) -> Result<Vec<Engagement>>;
}
