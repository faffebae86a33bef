#![forbid(unsafe_code)]

use crate::cache::RecentList;
use crate::domain::{Camera, Detection, SystemStats};
use crate::store::{ChangeEvent, EventType, Row, Table};
use serde::Serialize;
use tracing::{debug, warn};

/// What applying one change event did to the caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Inserted,
    Replaced,
    /// An update for a row that is not cached, or a stale stats snapshot.
    Dropped,
}

/// Point-in-time copy handed to presentation code and metrics views.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheSnapshot {
    pub detections: Vec<Detection>,
    pub cameras: Vec<Camera>,
    pub stats: Option<SystemStats>,
    pub connected: bool,
}

/// Client-side mirror of the three remote tables.
#[derive(Debug, Clone)]
pub struct EntityCaches {
    detections: RecentList<Detection>,
    cameras: Vec<Camera>,
    stats: Option<SystemStats>,
}

impl EntityCaches {
    pub fn new(detection_limit: usize) -> Self {
        Self {
            detections: RecentList::new(detection_limit),
            cameras: Vec::new(),
            stats: None,
        }
    }

    pub fn detections(&self) -> &RecentList<Detection> {
        &self.detections
    }

    pub fn cameras(&self) -> &[Camera] {
        &self.cameras
    }

    pub fn stats(&self) -> Option<&SystemStats> {
        self.stats.as_ref()
    }

    pub fn detection(&self, id: &crate::domain::RowId) -> Option<&Detection> {
        self.detections.iter().find(|d| &d.id == id)
    }

    /// Replace the cache of `table` with a freshly loaded page.
    ///
    /// Rows belonging to another table are skipped.
    pub fn replace(&mut self, table: Table, rows: Vec<Row>) {
        match table {
            Table::Detections => {
                let detections = rows.into_iter().filter_map(|row| match row {
                    Row::Detection(d) => Some(d),
                    other => {
                        warn!(table = %other.table(), "skipping foreign row in detection page");
                        None
                    }
                });
                self.detections.replace_all(detections);
            }
            Table::Cameras => {
                let mut cameras: Vec<Camera> = rows
                    .into_iter()
                    .filter_map(|row| match row {
                        Row::Camera(c) => Some(c),
                        _ => None,
                    })
                    .collect();
                cameras.sort_by(|a, b| a.camera_id.cmp(&b.camera_id));
                self.cameras = cameras;
            }
            Table::SystemStats => {
                self.stats = rows
                    .into_iter()
                    .filter_map(|row| match row {
                        Row::SystemStats(s) => Some(s),
                        _ => None,
                    })
                    .max_by_key(|s| s.timestamp);
            }
        }
    }

    pub fn apply(&mut self, event: &ChangeEvent) -> Applied {
        match (&event.row, event.event_type) {
            (Row::Detection(d), EventType::Insert) => {
                if let Some(evicted) = self.detections.push_front(d.clone()) {
                    debug!(id = %evicted.id, "detection evicted from cache");
                }
                Applied::Inserted
            }
            (Row::Detection(d), EventType::Update) => {
                if self.detections.replace_where(|e| e.id == d.id, d.clone()) {
                    Applied::Replaced
                } else {
                    debug!(id = %d.id, "update for uncached detection dropped");
                    Applied::Dropped
                }
            }
            (Row::Camera(c), event_type) => self.apply_camera(c, event_type),
            (Row::SystemStats(s), _) => match &self.stats {
                Some(current) if current.timestamp > s.timestamp => {
                    debug!(id = %s.id, "stale stats snapshot dropped");
                    Applied::Dropped
                }
                _ => {
                    self.stats = Some(s.clone());
                    Applied::Replaced
                }
            },
        }
    }

    fn apply_camera(&mut self, camera: &Camera, event_type: EventType) -> Applied {
        if let Some(slot) = self.cameras.iter_mut().find(|c| c.id == camera.id) {
            *slot = camera.clone();
            return Applied::Replaced;
        }
        match event_type {
            EventType::Insert => {
                let at = self
                    .cameras
                    .partition_point(|c| c.camera_id <= camera.camera_id);
                self.cameras.insert(at, camera.clone());
                Applied::Inserted
            }
            EventType::Update => {
                debug!(id = %camera.id, "update for uncached camera dropped");
                Applied::Dropped
            }
        }
    }

    pub fn snapshot(&self, connected: bool) -> CacheSnapshot {
        CacheSnapshot {
            detections: self.detections.to_vec(),
            cameras: self.cameras.clone(),
            stats: self.stats.clone(),
            connected,
        }
    }
}
