//! Process-local schedule store.

use super::{Engagement, ScheduleStore};
use crate::error::{ChimeError, Result};
use crate::scheduler::record::ScheduleRecord;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<String, ScheduleRecord>,
    engagements: Vec<Engagement>,
}

/// In-memory [`ScheduleStore`].
///
/// Not durable across process restarts. Share one instance (behind an
/// `Arc`) between scheduler instances to simulate a context restart.
#[derive(Debug, Default)]
pub struct MemoryScheduleStore {
    inner: Mutex<Inner>,
}

impl MemoryScheduleStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|e| ChimeError::StoreUnavailable(format!("memory store lock poisoned: {e}")))
    }
}

impl ScheduleStore for MemoryScheduleStore {
    fn put(&self, record: &ScheduleRecord) -> Result<()> {
        record.validate()?;
        self.lock()?
            .records
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<ScheduleRecord>> {
        Ok(self.lock()?.records.get(id).cloned())
    }

    fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.lock()?.records.remove(id).is_some())
    }

    fn list_all(&self) -> Result<Vec<ScheduleRecord>> {
        let mut records: Vec<ScheduleRecord> = self.lock()?.records.values().cloned().collect();
        records.sort_by(|a, b| a.fire_at_ms.cmp(&b.fire_at_ms).then_with(|| a.id.cmp(&b.id)));
        Ok(records)
    }

    fn delete_if_current(&self, expected: &ScheduleRecord) -> Result<bool> {
        let mut inner = self.lock()?;
        if inner.records.get(&expected.id) != Some(expected) {
            return Ok(false);
        }
        inner.records.remove(&expected.id);
        Ok(true)
    }

    fn advance_if_current(&self, expected: &ScheduleRecord, next: &ScheduleRecord) -> Result<bool> {
        next.validate()?;
        let mut inner = self.lock()?;
        if inner.records.get(&expected.id) != Some(expected) {
            return Ok(false);
        }
        inner.records.remove(&expected.id);
        inner.records.insert(next.id.clone(), next.clone());
        Ok(true)
    }

    fn record_engagement(&self, engagement: &Engagement) -> Result<()> {
        let mut inner = self.lock()?;
        let exists = inner.engagements.iter().any(|e| {
            e.day == engagement.day && e.notification_id == engagement.notification_id
        });
        if !exists {
            inner.engagements.push(engagement.clone());
        }
        Ok(())
    }

    fn engagements_on(&self, day: NaiveDate) -> Result<Vec<Engagement>> {
        Ok(self
            .lock()?
            .engagements
            .iter()
            .filter(|e| e.day == day)
            .cloned()
            .collect())
    }
}
