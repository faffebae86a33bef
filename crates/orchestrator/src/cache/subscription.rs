#![forbid(unsafe_code)]

use crate::cache::{CacheSnapshot, EntityCaches};
use crate::domain::{Camera, Detection, RowId, SystemStats};
use crate::store::{
    ChangeEvent, ChangeListener, ChannelId, EventFilter, Query, RemoteStore, StoreError,
    SubscriptionHandle, Table,
};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

/// A snapshot read that failed. The cache it targeted was left as it was.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("loading {table} failed: {reason}")]
pub struct LoadFailure {
    pub table: Table,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: Vec<(Table, usize)>,
    pub failures: Vec<LoadFailure>,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Read-only view over the caches owned by a [`SubscriptionManager`].
#[derive(Clone)]
pub struct CacheReader {
    caches: Arc<RwLock<EntityCaches>>,
    connected: watch::Receiver<bool>,
}

impl CacheReader {
    pub fn snapshot(&self) -> CacheSnapshot {
        self.caches.read().snapshot(self.is_connected())
    }

    pub fn detections(&self) -> Vec<Detection> {
        self.caches.read().detections().to_vec()
    }

    pub fn cameras(&self) -> Vec<Camera> {
        self.caches.read().cameras().to_vec()
    }

    pub fn active_cameras(&self) -> Vec<Camera> {
        self.caches
            .read()
            .cameras()
            .iter()
            .filter(|c| c.is_active())
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> Option<SystemStats> {
        self.caches.read().stats().cloned()
    }

    pub fn detection(&self, id: &RowId) -> Option<Detection> {
        self.caches.read().detection(id).cloned()
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// Receiver that changes whenever a load flips the connection flag.
    pub fn connection(&self) -> watch::Receiver<bool> {
        self.connected.clone()
    }
}

impl fmt::Debug for CacheReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheReader")
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

/// Owns the entity caches and keeps them in step with the remote store.
///
/// Snapshots are loaded with [`load_all`](Self::load_all), pushes are
/// followed once [`subscribe_all`](Self::subscribe_all) ran. Every channel
/// registered here is torn down on [`unsubscribe_all`](Self::unsubscribe_all)
/// or on drop.
pub struct SubscriptionManager {
    store: Arc<dyn RemoteStore>,
    caches: Arc<RwLock<EntityCaches>>,
    connected: watch::Sender<bool>,
    handles: Mutex<Vec<SubscriptionHandle>>,
    view: String,
    detection_limit: usize,
}

impl SubscriptionManager {
    /// `view` names the owner in channel identifiers, e.g. `dashboard`.
    pub fn new(store: Arc<dyn RemoteStore>, view: impl Into<String>, detection_limit: usize) -> Self {
        let (connected, _) = watch::channel(false);
        Self {
            store,
            caches: Arc::new(RwLock::new(EntityCaches::new(detection_limit))),
            connected,
            handles: Mutex::new(Vec::new()),
            view: view.into(),
            detection_limit,
        }
    }

    pub fn reader(&self) -> CacheReader {
        CacheReader {
            caches: Arc::clone(&self.caches),
            connected: self.connected.subscribe(),
        }
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// Fetch one page and swap it into the cache of `query.table`.
    ///
    /// On failure the cache keeps its previous content and the layer is
    /// marked disconnected.
    pub async fn load_snapshot(&self, query: &Query) -> Result<usize, LoadFailure> {
        match self.store.select(query).await {
            Ok(rows) => {
                let count = rows.len();
                self.caches.write().replace(query.table, rows);
                self.connected.send_replace(true);
                debug!(table = %query.table, count, "snapshot loaded");
                Ok(count)
            }
            Err(err) => {
                warn!(table = %query.table, error = %err, "snapshot load failed");
                self.connected.send_replace(false);
                Err(LoadFailure {
                    table: query.table,
                    reason: err.to_string(),
                })
            }
        }
    }

    /// Load detections, cameras and the latest stats snapshot.
    pub async fn load_all(&self) -> LoadReport {
        let queries = [
            Query::recent_detections(self.detection_limit),
            Query::all_cameras(),
            Query::latest_stats(),
        ];

        let mut report = LoadReport::default();
        for query in &queries {
            match self.load_snapshot(query).await {
                Ok(count) => report.loaded.push((query.table, count)),
                Err(failure) => report.failures.push(failure),
            }
        }
        // A later success must not hide an earlier failure.
        if !report.is_complete() {
            self.connected.send_replace(false);
        }
        report
    }

    pub fn subscribe(&self, table: Table) -> Result<SubscriptionHandle, StoreError> {
        self.register(table, None)
    }

    /// Like [`subscribe`](Self::subscribe), also calling `on_change` after
    /// the cache has absorbed each event.
    pub fn subscribe_with(
        &self,
        table: Table,
        on_change: ChangeListener,
    ) -> Result<SubscriptionHandle, StoreError> {
        self.register(table, Some(on_change))
    }

    pub fn subscribe_all(&self) -> Result<(), StoreError> {
        for table in [Table::Detections, Table::Cameras, Table::SystemStats] {
            self.subscribe(table)?;
        }
        Ok(())
    }

    fn register(
        &self,
        table: Table,
        on_change: Option<ChangeListener>,
    ) -> Result<SubscriptionHandle, StoreError> {
        let caches = Arc::clone(&self.caches);
        let listener: ChangeListener = Arc::new(move |event: &ChangeEvent| {
            let applied = caches.write().apply(event);
            trace!(table = %event.row.table(), id = %event.row.id(), ?applied, "change applied");
            if let Some(hook) = &on_change {
                hook(event);
            }
        });

        let channel = ChannelId::unique(table, &self.view);
        let handle = self
            .store
            .subscribe(channel, table, EventFilter::All, listener)?;
        self.handles.lock().push(handle.clone());
        Ok(handle)
    }

    /// Tear down one subscription. Calling it again is a no-op.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) {
        self.handles.lock().retain(|h| h != handle);
        self.store.unsubscribe(handle);
    }

    /// Tear down every subscription made through this manager.
    pub fn unsubscribe_all(&self) {
        let handles = std::mem::take(&mut *self.handles.lock());
        if handles.is_empty() {
            return;
        }
        for handle in &handles {
            self.store.unsubscribe(handle);
        }
        info!(view = %self.view, count = handles.len(), "subscriptions closed");
    }

    pub fn subscription_count(&self) -> usize {
        self.handles.lock().len()
    }
}

impl Drop for SubscriptionManager {
    fn drop(&mut self) {
        self.unsubscribe_all();
    }
}

impl fmt::Debug for SubscriptionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionManager")
            .field("view", &self.view)
            .field("subscriptions", &self.subscription_count())
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CameraStatus, NewCamera};
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn failed_load_keeps_previous_cache() {
        let store = Arc::new(MemoryStore::with_cameras([
            NewCamera::new("CAM-01", "Main Gate", CameraStatus::Active),
            NewCamera::new("CAM-02", "Toll Plaza", CameraStatus::Inactive),
        ]));
        let manager = SubscriptionManager::new(store.clone(), "test", 50);

        assert!(manager.load_all().await.is_complete());
        assert!(manager.is_connected());
        assert_eq!(manager.reader().cameras().len(), 2);

        store.set_available(false);
        let failure = manager.load_snapshot(&Query::all_cameras()).await.unwrap_err();
        assert_eq!(failure.table, Table::Cameras);
        assert!(!manager.is_connected());
        assert_eq!(manager.reader().cameras().len(), 2);
        assert_eq!(manager.reader().active_cameras().len(), 1);
    }

    #[tokio::test]
    async fn drop_closes_channels() {
        let store = Arc::new(MemoryStore::new());
        {
            let manager = SubscriptionManager::new(store.clone(), "test", 50);
            manager.subscribe_all().unwrap();
            assert_eq!(store.channel_count(), 3);
        }
        assert_eq!(store.channel_count(), 0);
    }
}
