#![forbid(unsafe_code)]

use crate::domain::RowId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Periodic rollup of the whole installation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStats {
    pub id: RowId,
    pub timestamp: DateTime<Utc>,
    pub active_cameras: u32,
    pub total_cameras: u32,
    pub detections_today: u64,
    pub detections_hour: u64,
    pub accuracy_rate: f64,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub network_latency: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SystemStatsDraft {
    pub active_cameras: u32,
    pub total_cameras: u32,
    pub detections_today: u64,
    pub detections_hour: u64,
    pub accuracy_rate: f64,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub network_latency: f64,
}

impl SystemStatsDraft {
    pub fn into_stats(self, id: RowId, timestamp: DateTime<Utc>) -> SystemStats {
        SystemStats {
            id,
            timestamp,
            active_cameras: self.active_cameras,
            total_cameras: self.total_cameras,
            detections_today: self.detections_today,
            detections_hour: self.detections_hour,
            accuracy_rate: self.accuracy_rate,
            cpu_usage: self.cpu_usage,
            memory_usage: self.memory_usage,
            network_latency: self.network_latency,
        }
    }
}
