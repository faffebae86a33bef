#![forbid(unsafe_code)]

use crate::domain::{DetectionDraft, NewCamera, SystemStatsDraft};
use crate::store::{
    ChangeListener, ChannelId, EventFilter, Query, Row, StoreError, SubscriptionHandle, Table,
};
use async_trait::async_trait;

/// A row to insert. The store assigns `id` and `timestamp`.
#[derive(Debug, Clone, PartialEq)]
pub enum NewRow {
    Detection(DetectionDraft),
    Camera(NewCamera),
    SystemStats(SystemStatsDraft),
}

impl NewRow {
    pub fn table(&self) -> Table {
        match self {
            Self::Detection(_) => Table::Detections,
            Self::Camera(_) => Table::Cameras,
            Self::SystemStats(_) => Table::SystemStats,
        }
    }
}

/// Hosted table storage with a push change feed.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Read rows matching `query`.
    async fn select(&self, query: &Query) -> Result<Vec<Row>, StoreError>;

    /// Insert a row and broadcast an `INSERT` event for it.
    async fn insert(&self, row: NewRow) -> Result<Row, StoreError>;

    /// Replace the row with the same id and broadcast an `UPDATE` event.
    async fn update(&self, row: Row) -> Result<Row, StoreError>;

    /// Register `listener` for changes to `table` on `channel`.
    ///
    /// Fails with [`StoreError::DuplicateChannel`] when `channel` is taken.
    fn subscribe(
        &self,
        channel: ChannelId,
        table: Table,
        events: EventFilter,
        listener: ChangeListener,
    ) -> Result<SubscriptionHandle, StoreError>;

    /// Tear down a subscription. Unknown or already removed handles are ignored.
    fn unsubscribe(&self, handle: &SubscriptionHandle);
}
