#![forbid(unsafe_code)]

use crate::domain::{Camera, NewCamera, RowId};
use crate::store::{
    ChangeEvent, ChangeFeed, ChangeListener, ChannelId, EventFilter, NewRow, Query, RemoteStore,
    Row, StoreError, SubscriptionHandle, Table,
};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use tracing::debug;

/// In-process store with a synchronous change feed.
///
/// Used by tests and by the daemon when no database is configured. Faults
/// can be injected with [`MemoryStore::set_available`] and
/// [`MemoryStore::set_reject_inserts`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<BTreeMap<Table, Vec<Row>>>,
    feed: ChangeFeed,
    next_id: AtomicI64,
    unavailable: AtomicBool,
    reject_inserts: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `cameras`. No events are published.
    pub fn with_cameras(cameras: impl IntoIterator<Item = NewCamera>) -> Self {
        let store = Self::new();
        store.seed_cameras(cameras);
        store
    }

    pub fn seed_cameras(&self, cameras: impl IntoIterator<Item = NewCamera>) -> Vec<Camera> {
        let mut tables = self.tables.lock();
        let rows = tables.entry(Table::Cameras).or_default();
        cameras
            .into_iter()
            .map(|camera| {
                let camera = camera.into_camera(self.allocate_id());
                rows.push(Row::Camera(camera.clone()));
                camera
            })
            .collect()
    }

    /// When false every operation fails with [`StoreError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::Relaxed);
    }

    /// When true inserts fail while reads keep working.
    pub fn set_reject_inserts(&self, reject: bool) {
        self.reject_inserts.store(reject, Ordering::Relaxed);
    }

    pub fn row_count(&self, table: Table) -> usize {
        self.tables.lock().get(&table).map_or(0, Vec::len)
    }

    pub fn channel_count(&self) -> usize {
        self.feed.channel_count()
    }

    /// Broadcast an event without touching the tables, as a server-side
    /// trigger would.
    pub fn push(&self, event: ChangeEvent) {
        self.feed.publish(&event);
    }

    fn allocate_id(&self) -> RowId {
        RowId::from(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::Relaxed) {
            Err(StoreError::Unavailable("memory store is offline".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn select(&self, query: &Query) -> Result<Vec<Row>, StoreError> {
        self.ensure_available()?;
        if let Some(column) = query.unknown_column() {
            return Err(StoreError::UnknownColumn {
                table: query.table,
                column: column.as_str(),
            });
        }

        let tables = self.tables.lock();
        let mut rows: Vec<Row> = tables
            .get(&query.table)
            .into_iter()
            .flatten()
            .filter(|row| {
                query
                    .filters
                    .iter()
                    .all(|f| row.column_value(f.column).as_deref() == Some(f.value.as_str()))
            })
            .cloned()
            .collect();
        drop(tables);

        if let Some(order) = query.order {
            if order.descending {
                // Later inserts win ties.
                rows.reverse();
                rows.sort_by(|a, b| b.column_value(order.column).cmp(&a.column_value(order.column)));
            } else {
                rows.sort_by(|a, b| a.column_value(order.column).cmp(&b.column_value(order.column)));
            }
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn insert(&self, row: NewRow) -> Result<Row, StoreError> {
        self.ensure_available()?;
        if self.reject_inserts.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable("inserts are rejected".into()));
        }

        let id = self.allocate_id();
        let now = Utc::now();
        let row = match row {
            NewRow::Detection(draft) => Row::Detection(draft.into_detection(id, now)),
            NewRow::Camera(camera) => Row::Camera(camera.into_camera(id)),
            NewRow::SystemStats(draft) => Row::SystemStats(draft.into_stats(id, now)),
        };

        self.tables
            .lock()
            .entry(row.table())
            .or_default()
            .push(row.clone());
        debug!(table = %row.table(), id = %row.id(), "row inserted");

        self.feed.publish(&ChangeEvent::insert(row.clone()));
        Ok(row)
    }

    async fn update(&self, row: Row) -> Result<Row, StoreError> {
        self.ensure_available()?;
        let table = row.table();
        {
            let mut tables = self.tables.lock();
            let slot = tables
                .get_mut(&table)
                .and_then(|rows| rows.iter_mut().find(|r| r.id() == row.id()))
                .ok_or_else(|| StoreError::NotFound {
                    table,
                    id: row.id().to_string(),
                })?;
            *slot = row.clone();
        }
        debug!(%table, id = %row.id(), "row updated");

        self.feed.publish(&ChangeEvent::update(row.clone()));
        Ok(row)
    }

    fn subscribe(
        &self,
        channel: ChannelId,
        table: Table,
        events: EventFilter,
        listener: ChangeListener,
    ) -> Result<SubscriptionHandle, StoreError> {
        self.feed.register(channel, table, events, listener)
    }

    fn unsubscribe(&self, handle: &SubscriptionHandle) {
        self.feed.remove(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CameraStatus, Confidence, DetectionDraft, DetectionStatus};
    use crate::store::Column;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    fn draft(camera: &str, plate: &str) -> DetectionDraft {
        DetectionDraft {
            plate_number: plate.into(),
            camera_id: camera.into(),
            confidence: Confidence::saturating(93.0),
            location: "Main Gate".into(),
            status: DetectionStatus::Cleared,
            user_id: None,
            image_url: None,
        }
    }

    #[tokio::test]
    async fn select_filters_orders_and_limits() {
        let store = MemoryStore::new();
        for plate in ["TN-01-AA-1000", "TN-01-AA-2000", "TN-01-AA-3000"] {
            store
                .insert(NewRow::Detection(draft("CAM-01", plate)))
                .await
                .unwrap();
        }
        store
            .insert(NewRow::Detection(draft("CAM-02", "KA-01-AA-4000")))
            .await
            .unwrap();

        let query = Query::recent_detections(2).filter(Column::CameraId, "CAM-01");
        let rows = store.select(&query).await.unwrap();
        let plates: Vec<_> = rows
            .iter()
            .map(|r| match r {
                Row::Detection(d) => d.plate_number.as_str(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(plates, ["TN-01-AA-3000", "TN-01-AA-2000"]);
    }

    #[tokio::test]
    async fn duplicate_channel_is_rejected() {
        let store = MemoryStore::new();
        let listener: ChangeListener = Arc::new(|_: &ChangeEvent| {});
        let channel = ChannelId::new("detections_dashboard");
        store
            .subscribe(channel.clone(), Table::Detections, EventFilter::All, listener.clone())
            .unwrap();
        let err = store
            .subscribe(channel, Table::Detections, EventFilter::All, listener)
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateChannel(_)));
    }

    #[tokio::test]
    async fn event_filter_limits_delivery() {
        let store = MemoryStore::with_cameras([NewCamera::new("CAM-01", "Gate", CameraStatus::Active)]);
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        store
            .subscribe(
                ChannelId::new("inserts_only"),
                Table::Detections,
                EventFilter::Only(crate::store::EventType::Insert),
                Arc::new(move |_: &ChangeEvent| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();

        let row = store
            .insert(NewRow::Detection(draft("CAM-01", "TN-01-AA-1000")))
            .await
            .unwrap();
        store.update(row).await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn offline_store_fails_every_call() {
        let store = MemoryStore::new();
        store.set_available(false);
        assert!(store.select(&Query::all_cameras()).await.is_err());
        assert!(
            store
                .insert(NewRow::Detection(draft("CAM-01", "TN-01-AA-1000")))
                .await
                .is_err()
        );
    }
}
