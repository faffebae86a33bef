#![forbid(unsafe_code)]

use crate::domain::{
    Camera, Confidence, Detection, DetectionDraft, NewCamera, RowId, SystemStats,
    SystemStatsDraft,
};
use crate::store::query::encode_time;
use crate::store::{
    ChangeEvent, ChangeFeed, ChangeListener, ChannelId, EventFilter, NewRow, Query, RemoteStore,
    Row, StoreError, SubscriptionHandle, Table,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row as _;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Store backed by a local SQLite database.
///
/// Change events are published in-process after each successful write, so
/// subscribers only observe writes made through this handle.
#[derive(Debug)]
pub struct SqliteStore {
    path: PathBuf,
    pool: SqlitePool,
    feed: ChangeFeed,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and run migrations.
    pub async fn new(path: PathBuf) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self {
            path,
            pool,
            feed: ChangeFeed::default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn insert_detection(&self, draft: DetectionDraft) -> Result<Row, StoreError> {
        let timestamp = Utc::now();
        let result = sqlx::query(
            "INSERT INTO detections \
             (plate_number, camera_id, confidence, timestamp, location, status, user_id, image_url) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&draft.plate_number)
        .bind(&draft.camera_id)
        .bind(i64::from(draft.confidence.get()))
        .bind(encode_time(&timestamp))
        .bind(&draft.location)
        .bind(draft.status.as_str())
        .bind(draft.user_id.as_deref())
        .bind(draft.image_url.as_deref())
        .execute(&self.pool)
        .await?;

        let id = RowId::from(result.last_insert_rowid());
        Ok(Row::Detection(draft.into_detection(id, timestamp)))
    }

    async fn insert_camera(&self, camera: NewCamera) -> Result<Row, StoreError> {
        let result = sqlx::query(
            "INSERT INTO cameras (camera_id, location, status, ip_address) VALUES (?, ?, ?, ?)",
        )
        .bind(&camera.camera_id)
        .bind(&camera.location)
        .bind(camera.status.as_str())
        .bind(camera.ip_address.as_deref())
        .execute(&self.pool)
        .await?;

        let id = RowId::from(result.last_insert_rowid());
        Ok(Row::Camera(camera.into_camera(id)))
    }

    async fn insert_stats(&self, draft: SystemStatsDraft) -> Result<Row, StoreError> {
        let timestamp = Utc::now();
        let result = sqlx::query(
            "INSERT INTO system_stats \
             (timestamp, active_cameras, total_cameras, detections_today, detections_hour, \
              accuracy_rate, cpu_usage, memory_usage, network_latency) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(encode_time(&timestamp))
        .bind(i64::from(draft.active_cameras))
        .bind(i64::from(draft.total_cameras))
        .bind(draft.detections_today as i64)
        .bind(draft.detections_hour as i64)
        .bind(draft.accuracy_rate)
        .bind(draft.cpu_usage)
        .bind(draft.memory_usage)
        .bind(draft.network_latency)
        .execute(&self.pool)
        .await?;

        let id = RowId::from(result.last_insert_rowid());
        Ok(Row::SystemStats(draft.into_stats(id, timestamp)))
    }

    async fn update_row(&self, row: &Row) -> Result<u64, StoreError> {
        let table = row.table();
        let id: i64 = row.id().as_str().parse().map_err(|_| StoreError::NotFound {
            table,
            id: row.id().to_string(),
        })?;

        let query = match row {
            Row::Detection(d) => sqlx::query(
                "UPDATE detections SET plate_number = ?, camera_id = ?, confidence = ?, \
                 timestamp = ?, location = ?, status = ?, user_id = ?, image_url = ? WHERE id = ?",
            )
            .bind(&d.plate_number)
            .bind(&d.camera_id)
            .bind(i64::from(d.confidence.get()))
            .bind(encode_time(&d.timestamp))
            .bind(&d.location)
            .bind(d.status.as_str())
            .bind(d.user_id.as_deref())
            .bind(d.image_url.as_deref()),
            Row::Camera(c) => sqlx::query(
                "UPDATE cameras SET camera_id = ?, location = ?, status = ?, ip_address = ?, \
                 last_heartbeat = ? WHERE id = ?",
            )
            .bind(&c.camera_id)
            .bind(&c.location)
            .bind(c.status.as_str())
            .bind(c.ip_address.as_deref())
            .bind(c.last_heartbeat.as_ref().map(encode_time)),
            Row::SystemStats(s) => sqlx::query(
                "UPDATE system_stats SET timestamp = ?, active_cameras = ?, total_cameras = ?, \
                 detections_today = ?, detections_hour = ?, accuracy_rate = ?, cpu_usage = ?, \
                 memory_usage = ?, network_latency = ? WHERE id = ?",
            )
            .bind(encode_time(&s.timestamp))
            .bind(i64::from(s.active_cameras))
            .bind(i64::from(s.total_cameras))
            .bind(s.detections_today as i64)
            .bind(s.detections_hour as i64)
            .bind(s.accuracy_rate)
            .bind(s.cpu_usage)
            .bind(s.memory_usage)
            .bind(s.network_latency),
        };

        Ok(query.bind(id).execute(&self.pool).await?.rows_affected())
    }
}

fn decode_time(table: Table, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|err| StoreError::InvalidRow {
            table,
            reason: format!("bad timestamp `{value}`: {err}"),
        })
}

fn decode_row(table: Table, row: &SqliteRow) -> Result<Row, StoreError> {
    let invalid = |reason: String| StoreError::InvalidRow { table, reason };
    let id = RowId::from(row.try_get::<i64, _>("id")?);

    match table {
        Table::Detections => {
            let confidence: i64 = row.try_get("confidence")?;
            let status: String = row.try_get("status")?;
            let timestamp: String = row.try_get("timestamp")?;
            Ok(Row::Detection(Detection {
                id,
                plate_number: row.try_get("plate_number")?,
                camera_id: row.try_get("camera_id")?,
                confidence: Confidence::try_from(confidence).map_err(invalid)?,
                timestamp: decode_time(table, &timestamp)?,
                location: row.try_get("location")?,
                status: status.parse().map_err(invalid)?,
                user_id: row.try_get("user_id")?,
                image_url: row.try_get("image_url")?,
            }))
        }
        Table::Cameras => {
            let status: String = row.try_get("status")?;
            let heartbeat: Option<String> = row.try_get("last_heartbeat")?;
            Ok(Row::Camera(Camera {
                id,
                camera_id: row.try_get("camera_id")?,
                location: row.try_get("location")?,
                status: status.parse().map_err(invalid)?,
                ip_address: row.try_get("ip_address")?,
                last_heartbeat: heartbeat
                    .as_deref()
                    .map(|t| decode_time(table, t))
                    .transpose()?,
            }))
        }
        Table::SystemStats => {
            let timestamp: String = row.try_get("timestamp")?;
            Ok(Row::SystemStats(SystemStats {
                id,
                timestamp: decode_time(table, &timestamp)?,
                active_cameras: row.try_get::<i64, _>("active_cameras")?.max(0) as u32,
                total_cameras: row.try_get::<i64, _>("total_cameras")?.max(0) as u32,
                detections_today: row.try_get::<i64, _>("detections_today")?.max(0) as u64,
                detections_hour: row.try_get::<i64, _>("detections_hour")?.max(0) as u64,
                accuracy_rate: row.try_get("accuracy_rate")?,
                cpu_usage: row.try_get("cpu_usage")?,
                memory_usage: row.try_get("memory_usage")?,
                network_latency: row.try_get("network_latency")?,
            }))
        }
    }
}

#[async_trait]
impl RemoteStore for SqliteStore {
    async fn select(&self, query: &Query) -> Result<Vec<Row>, StoreError> {
        if let Some(column) = query.unknown_column() {
            return Err(StoreError::UnknownColumn {
                table: query.table,
                column: column.as_str(),
            });
        }

        // Table and column names come from closed enums, values are bound.
        let mut sql = format!("SELECT * FROM {}", query.table);
        for (i, filter) in query.filters.iter().enumerate() {
            sql.push_str(if i == 0 { " WHERE " } else { " AND " });
            sql.push_str(filter.column.as_str());
            sql.push_str(" = ?");
        }
        if let Some(order) = query.order {
            let dir = if order.descending { "DESC" } else { "ASC" };
            sql.push_str(&format!(" ORDER BY {} {dir}, id {dir}", order.column.as_str()));
        }
        if query.limit.is_some() {
            sql.push_str(" LIMIT ?");
        }

        let mut statement = sqlx::query(&sql);
        for filter in &query.filters {
            statement = statement.bind(filter.value.as_str());
        }
        if let Some(limit) = query.limit {
            statement = statement.bind(limit as i64);
        }

        let rows = statement.fetch_all(&self.pool).await?;
        rows.iter().map(|row| decode_row(query.table, row)).collect()
    }

    async fn insert(&self, row: NewRow) -> Result<Row, StoreError> {
        let row = match row {
            NewRow::Detection(draft) => self.insert_detection(draft).await?,
            NewRow::Camera(camera) => self.insert_camera(camera).await?,
            NewRow::SystemStats(draft) => self.insert_stats(draft).await?,
        };
        debug!(path = %self.path.display(), table = %row.table(), id = %row.id(), "row inserted");
        self.feed.publish(&ChangeEvent::insert(row.clone()));
        Ok(row)
    }

    async fn update(&self, row: Row) -> Result<Row, StoreError> {
        if self.update_row(&row).await? == 0 {
            return Err(StoreError::NotFound {
                table: row.table(),
                id: row.id().to_string(),
            });
        }
        debug!(path = %self.path.display(), table = %row.table(), id = %row.id(), "row updated");
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
