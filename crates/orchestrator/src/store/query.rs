#![forbid(unsafe_code)]

use crate::domain::{Camera, Detection, RowId, SystemStats};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Detections,
    Cameras,
    SystemStats,
}

impl Table {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Detections => "detections",
            Self::Cameras => "cameras",
            Self::SystemStats => "system_stats",
        }
    }

    /// Columns that may appear in filters and orderings for this table.
    pub fn columns(self) -> &'static [Column] {
        match self {
            Self::Detections => &[
                Column::Id,
                Column::PlateNumber,
                Column::CameraId,
                Column::Location,
                Column::Status,
                Column::Timestamp,
            ],
            Self::Cameras => &[Column::Id, Column::CameraId, Column::Location, Column::Status],
            Self::SystemStats => &[Column::Id, Column::Timestamp],
        }
    }

    pub fn has_column(self, column: Column) -> bool {
        self.columns().contains(&column)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Id,
    PlateNumber,
    CameraId,
    Location,
    Status,
    Timestamp,
}

impl Column {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::PlateNumber => "plate_number",
            Self::CameraId => "camera_id",
            Self::Location => "location",
            Self::Status => "status",
            Self::Timestamp => "timestamp",
        }
    }
}

/// Equality filter on one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: Column,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
    pub column: Column,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub table: Table,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn table(table: Table) -> Self {
        Self {
            table,
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    pub fn filter(mut self, column: Column, value: impl Into<String>) -> Self {
        self.filters.push(Filter {
            column,
            value: value.into(),
        });
        self
    }

    pub fn order_by(mut self, column: Column, descending: bool) -> Self {
        self.order = Some(Order { column, descending });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Newest detections first, bounded to `limit`.
    pub fn recent_detections(limit: usize) -> Self {
        Self::table(Table::Detections)
            .order_by(Column::Timestamp, true)
            .limit(limit)
    }

    /// Every camera ordered by its human code.
    pub fn all_cameras() -> Self {
        Self::table(Table::Cameras).order_by(Column::CameraId, false)
    }

    pub fn latest_stats() -> Self {
        Self::table(Table::SystemStats)
            .order_by(Column::Timestamp, true)
            .limit(1)
    }

    /// First column not present on the queried table, if any.
    pub fn unknown_column(&self) -> Option<Column> {
        self.filters
            .iter()
            .map(|f| f.column)
            .chain(self.order.map(|o| o.column))
            .find(|c| !self.table.has_column(*c))
    }
}

/// A row of any mirrored table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "table", content = "row", rename_all = "snake_case")]
pub enum Row {
    Detection(Detection),
    Camera(Camera),
    SystemStats(SystemStats),
}

impl Row {
    pub fn table(&self) -> Table {
        match self {
            Self::Detection(_) => Table::Detections,
            Self::Camera(_) => Table::Cameras,
            Self::SystemStats(_) => Table::SystemStats,
        }
    }

    pub fn id(&self) -> &RowId {
        match self {
            Self::Detection(d) => &d.id,
            Self::Camera(c) => &c.id,
            Self::SystemStats(s) => &s.id,
        }
    }

    /// Text value of `column` used for filtering and ordering.
    pub fn column_value(&self, column: Column) -> Option<String> {
        match (self, column) {
            (_, Column::Id) => Some(self.id().to_string()),
            (Self::Detection(d), Column::PlateNumber) => Some(d.plate_number.clone()),
            (Self::Detection(d), Column::CameraId) => Some(d.camera_id.clone()),
            (Self::Detection(d), Column::Location) => Some(d.location.clone()),
            (Self::Detection(d), Column::Status) => Some(d.status.to_string()),
            (Self::Detection(d), Column::Timestamp) => Some(encode_time(&d.timestamp)),
            (Self::Camera(c), Column::CameraId) => Some(c.camera_id.clone()),
            (Self::Camera(c), Column::Location) => Some(c.location.clone()),
            (Self::Camera(c), Column::Status) => Some(c.status.to_string()),
            (Self::SystemStats(s), Column::Timestamp) => Some(encode_time(&s.timestamp)),
            _ => None,
        }
    }
}

/// Fixed-width RFC 3339 so that text ordering matches time ordering.
pub(crate) fn encode_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_column_is_reported() {
        let query = Query::table(Table::SystemStats).filter(Column::CameraId, "CAM-01");
        assert_eq!(query.unknown_column(), Some(Column::CameraId));
        assert_eq!(Query::recent_detections(50).unknown_column(), None);
    }

    #[test]
    fn encoded_times_sort_chronologically() {
        let early = DateTime::from_timestamp(1_700_000_000, 5_000).unwrap();
        let late = DateTime::from_timestamp(1_700_000_000, 50_000_000).unwrap();
        assert!(encode_time(&early) < encode_time(&late));
    }
}
