//! In-memory snapshot of the store's pending jobs.
//!
//! The snapshot is only reloaded when the store's change marker moves, so
//! the sub-second loops that read it cost one marker comparison per tick.

use std::sync::Arc;

use opentelemetry::KeyValue;
use tokio::sync::{Mutex, RwLock};
use tracing::trace;

use crate::error::Result;
use crate::model::JobRecord;
use crate::store::{ChangeMarker, JobStore};
use crate::telemetry::metrics;

/// Copy-on-write mirror of pending job records.
pub struct LocalJobMirror {
    store: Arc<dyn JobStore>,
    snapshot: RwLock<Arc<Vec<JobRecord>>>,
    /// Marker of the store state the snapshot was built from. Held for the
    /// whole refresh so two refreshes never interleave their compare and
    /// replace steps.
    last_seen: Mutex<Option<ChangeMarker>>,
}

impl LocalJobMirror {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            store,
            snapshot: RwLock::new(Arc::new(Vec::new())),
            last_seen: Mutex::new(None),
        }
    }

    /// Reload the snapshot if the store changed since the last reload.
    ///
    /// Returns `true` when the snapshot was replaced. The marker is read
    /// before the records, so a write racing with the reload leaves the
    /// mirror one marker behind and the next refresh picks it up.
    pub async fn refresh(&self) -> Result<bool> {
        let mut last_seen = self.last_seen.lock().await;

        let marker = self.store.change_marker().await?;
        if *last_seen == Some(marker) {
            metrics::mirror_refreshes().add(1, &[KeyValue::new("outcome", "clean")]);
            return Ok(false);
        }

        let records = self.store.pending_records().await?;
        trace!(marker = marker.0, pending = records.len(), "mirror reloaded");

        *self.snapshot.write().await = Arc::new(records);
        *last_seen = Some(marker);

        metrics::mirror_refreshes().add(1, &[KeyValue::new("outcome", "reloaded")]);
        Ok(true)
    }

    /// Immutable handle to the current snapshot. Stays valid (and unchanged)
    /// even if a refresh replaces the mirror while the caller iterates.
    pub async fn snapshot(&self) -> Arc<Vec<JobRecord>> {
        Arc::clone(&*self.snapshot.read().await)
    }

    /// Owned copy of the current snapshot.
    pub async fn read(&self) -> Vec<JobRecord> {
        self.snapshot().await.as_ref().clone()
    }

    /// Marker of the store state currently mirrored, if any.
    pub async fn last_seen(&self) -> Option<ChangeMarker> {
        *self.last_seen.lock().await
    }
}
