//! The durable job store the controller reads from and writes status into.
//!
//! Every write bumps a monotonic [`ChangeMarker`]; readers compare markers
//! to skip reloading a collection that has not changed.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{Error, Result};
use crate::model::{JobId, JobRecord, NewJob};

/// Opaque token that changes whenever the store's contents change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChangeMarker(pub u64);

/// Store collaborator consumed by the controller.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// All records that have not reached a terminal status, oldest first.
    async fn pending_records(&self) -> Result<Vec<JobRecord>>;

    /// Current change marker. Must be cheap.
    async fn change_marker(&self) -> Result<ChangeMarker>;

    /// Replace the stored record with the same id.
    async fn update(&self, record: &JobRecord) -> Result<()>;
}

struct Inner {
    records: Vec<JobRecord>,
    marker: u64,
}

/// In-process store. Records are kept in insertion order.
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                records: Vec::new(),
                marker: 0,
            }),
        }
    }

    fn read(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| Error::StoreRead("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| Error::StoreWrite("memory store lock poisoned".to_string()))
    }

    /// Persist a new waiting job.
    pub fn insert(&self, new: NewJob) -> Result<JobRecord> {
        let record = new.into_record();
        let mut inner = self.write()?;
        inner.records.push(record.clone());
        inner.marker += 1;
        Ok(record)
    }

    /// Look up a record by id, terminal or not.
    pub fn get(&self, id: JobId) -> Result<JobRecord> {
        let inner = self.read()?;
        inner
            .records
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(Error::NotFound(id))
    }

    /// Every record, including terminal ones.
    pub fn all(&self) -> Result<Vec<JobRecord>> {
        Ok(self.read()?.records.clone())
    }

    /// Delete a record (e.g. after the caller has collected its artifact).
    pub fn remove(&self, id: JobId) -> Result<JobRecord> {
        let mut inner = self.write()?;
        let pos = inner
            .records
            .iter()
            .position(|r| r.id == id)
            .ok_or(Error::NotFound(id))?;
        let removed = inner.records.remove(pos);
        inner.marker += 1;
        Ok(removed)
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn pending_records(&self) -> Result<Vec<JobRecord>> {
        let inner = self.read()?;
        let mut pending: Vec<JobRecord> = inner
            .records
            .iter()
            .filter(|r| !r.status.is_terminal())
            .cloned()
            .collect();
        // Stable: ties keep insertion order.
        pending.sort_by_key(|r| r.submitted_at);
        Ok(pending)
    }

    async fn change_marker(&self) -> Result<ChangeMarker> {
        Ok(ChangeMarker(self.read()?.marker))
    }

    async fn update(&self, record: &JobRecord) -> Result<()> {
        let mut inner = self.write()?;
        let slot = inner
            .records
            .iter_mut()
            .find(|r| r.id == record.id)
            .ok_or(Error::NotFound(record.id))?;
        slot.status.ensure_transition(record.status)?;

        *slot = JobRecord {
            updated_at: Utc::now(),
            ..record.clone()
        };
        inner.marker += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::JobStatus;

    fn poisoned_store() -> (MemoryStore, JobRecord) {
        let store = MemoryStore::new();
        let record = store
            .insert(NewJob::new(serde_json::json!({ "prompt": "a lighthouse" })))
            .unwrap();
        std::thread::scope(|s| {
            let _ = s
                .spawn(|| {
                    let _guard = store.inner.lock().unwrap();
                    panic!("poison the lock");
                })
                .join();
        });
        (store, record)
    }

    #[tokio::test]
    async fn poisoned_lock_reports_write_paths_as_write_failures() {
        let (store, record) = poisoned_store();
        let queued = JobRecord {
            status: JobStatus::Queued,
            ..record.clone()
        };

        assert!(matches!(store.update(&queued).await, Err(Error::StoreWrite(_))));
        assert!(matches!(
            store.insert(NewJob::new(serde_json::json!({}))),
            Err(Error::StoreWrite(_))
        ));
        assert!(matches!(store.remove(record.id), Err(Error::StoreWrite(_))));
    }

    #[tokio::test]
    async fn poisoned_lock_reports_read_paths_as_read_failures() {
        let (store, record) = poisoned_store();

        assert!(matches!(store.pending_records().await, Err(Error::StoreRead(_))));
        assert!(matches!(store.change_marker().await, Err(Error::StoreRead(_))));
        assert!(matches!(store.get(record.id), Err(Error::StoreRead(_))));
        assert!(matches!(store.all(), Err(Error::StoreRead(_))));
    }
}
