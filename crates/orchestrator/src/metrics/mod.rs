#![forbid(unsafe_code)]

//! Read models derived from cache snapshots.
//!
//! Everything here is a pure function recomputed on each call. Empty input
//! yields zeroed aggregates.

pub mod risk;

pub use risk::{RiskAssessment, RiskFactor, RiskLevel, ThreatStats, assess_plates, threat_stats};

use crate::cache::CacheSnapshot;
use crate::domain::{Camera, Detection, SystemStats};
use crate::simulation::SystemLoad;
use chrono::{DateTime, TimeDelta, Utc};
use itertools::Itertools;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Number of most recent detections the traffic insights look at.
pub const INSIGHT_SAMPLE: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SystemMetrics {
    pub total_detections: usize,
    pub flagged: usize,
    /// Rounded to a whole percent.
    pub average_confidence: u8,
    pub active_cameras: usize,
    pub total_cameras: usize,
    pub active_ratio: f64,
}

pub fn system_metrics(detections: &[Detection], cameras: &[Camera]) -> SystemMetrics {
    let active_cameras = cameras.iter().filter(|c| c.is_active()).count();
    SystemMetrics {
        total_detections: detections.len(),
        flagged: detections.iter().filter(|d| d.is_flagged()).count(),
        average_confidence: average_confidence(detections).round() as u8,
        active_cameras,
        total_cameras: cameras.len(),
        active_ratio: ratio(active_cameras, cameras.len()),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CameraActivity {
    pub detections: usize,
    pub last_detection: Option<DateTime<Utc>>,
    pub average_confidence: f64,
}

/// Per camera code, over every cached detection.
pub fn camera_breakdown(detections: &[Detection]) -> BTreeMap<String, CameraActivity> {
    detections
        .iter()
        .into_group_map_by(|d| d.camera_id.clone())
        .into_iter()
        .map(|(camera_id, group)| {
            let activity = CameraActivity {
                detections: group.len(),
                last_detection: group.iter().map(|d| d.timestamp).max(),
                average_confidence: average_confidence(group.iter().copied()),
            };
            (camera_id, activity)
        })
        .collect()
}

pub fn location_breakdown(detections: &[Detection]) -> BTreeMap<String, usize> {
    detections
        .iter()
        .counts_by(|d| d.location.clone())
        .into_iter()
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentActivity {
    pub camera_id: String,
    pub location: String,
    pub recent_detections: usize,
    pub last_detection: Option<DateTime<Utc>>,
}

/// Per active camera, detections newer than `now - window`.
pub fn recent_activity(
    cameras: &[Camera],
    detections: &[Detection],
    now: DateTime<Utc>,
    window: Duration,
) -> Vec<RecentActivity> {
    let window = TimeDelta::from_std(window).unwrap_or(TimeDelta::MAX);
    let cutoff = now.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC);
    cameras
        .iter()
        .filter(|c| c.is_active())
        .map(|camera| {
            let own = || detections.iter().filter(|d| d.camera_id == camera.camera_id);
            RecentActivity {
                camera_id: camera.camera_id.clone(),
                location: camera.location.clone(),
                recent_detections: own().filter(|d| d.timestamp > cutoff).count(),
                last_detection: own().map(|d| d.timestamp).max(),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ThreatLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl ThreatLevel {
    pub fn from_incidents(flagged: usize) -> Self {
        match flagged {
            0..=2 => Self::Low,
            3..=5 => Self::Medium,
            _ => Self::High,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ThreatAssessment {
    pub level: ThreatLevel,
    pub active_incidents: usize,
}

pub fn threat_assessment(detections: &[Detection]) -> ThreatAssessment {
    let active_incidents = detections.iter().filter(|d| d.is_flagged()).count();
    ThreatAssessment {
        level: ThreatLevel::from_incidents(active_incidents),
        active_incidents,
    }
}

/// `100 - (cpu + memory) / 2`, or `None` before the first stats snapshot.
pub fn network_health(stats: Option<&SystemStats>) -> Option<f64> {
    stats.map(|s| (100.0 - (s.cpu_usage + s.memory_usage) / 2.0).clamp(0.0, 100.0))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrafficInsights {
    pub sample: usize,
    pub out_of_region_pct: f64,
    pub flagged: usize,
    pub average_confidence: f64,
}

/// Over the newest [`INSIGHT_SAMPLE`] detections of a most-recent-first list.
pub fn traffic_insights(detections: &[Detection], home_region: &str) -> TrafficInsights {
    let sample = &detections[..detections.len().min(INSIGHT_SAMPLE)];
    let foreign = sample.iter().filter(|d| d.region() != home_region).count();
    TrafficInsights {
        sample: sample.len(),
        out_of_region_pct: ratio(foreign, sample.len()) * 100.0,
        flagged: sample.iter().filter(|d| d.is_flagged()).count(),
        average_confidence: average_confidence(sample),
    }
}

/// Every view at once, as dumped by the daemon.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsReport {
    pub connected: bool,
    pub system: SystemMetrics,
    pub cameras: BTreeMap<String, CameraActivity>,
    pub locations: BTreeMap<String, usize>,
    pub recent: Vec<RecentActivity>,
    pub threat: ThreatAssessment,
    pub network_health: Option<f64>,
    pub traffic: TrafficInsights,
    /// Per-level counts over one risk assessment per cached plate.
    pub risk: ThreatStats,
    pub processing_efficiency: f64,
}

impl MetricsReport {
    pub fn build(
        snapshot: &CacheSnapshot,
        config: &config::Config,
        load: &SystemLoad,
        now: DateTime<Utc>,
    ) -> Self {
        let detections = &snapshot.detections;
        let cache = &config.cache;
        let assessments = assess_plates(detections, now, &cache.home_region, &config.risk);
        Self {
            connected: snapshot.connected,
            system: system_metrics(detections, &snapshot.cameras),
            cameras: camera_breakdown(detections),
            locations: location_breakdown(detections),
            recent: recent_activity(&snapshot.cameras, detections, now, cache.activity_window),
            threat: threat_assessment(detections),
            network_health: network_health(snapshot.stats.as_ref()),
            traffic: traffic_insights(detections, &cache.home_region),
            risk: threat_stats(&assessments),
            processing_efficiency: load.processing_efficiency(),
        }
    }
}

fn average_confidence<'a>(detections: impl IntoIterator<Item = &'a Detection>) -> f64 {
    let (sum, count) = detections
        .into_iter()
        .fold((0u64, 0usize), |(sum, count), d| {
            (sum + u64::from(d.confidence.get()), count + 1)
        });
    if count == 0 {
        0.0
    } else {
        sum as f64 / count as f64
    }
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CameraStatus, Confidence, DetectionStatus, NewCamera, RowId};
    use pretty_assertions::assert_eq;

    fn detection(id: i64, camera: &str, plate: &str, confidence: u8, status: DetectionStatus) -> Detection {
        Detection {
            id: RowId::from(id),
            plate_number: plate.into(),
            camera_id: camera.into(),
            confidence: Confidence::saturating(f64::from(confidence)),
            timestamp: DateTime::from_timestamp(1_700_000_000 + id, 0).unwrap(),
            location: format!("{camera} gate"),
            status,
            user_id: None,
            image_url: None,
        }
    }

    #[test]
    fn empty_input_yields_zeros() {
        assert_eq!(system_metrics(&[], &[]), SystemMetrics::default());
        assert!(camera_breakdown(&[]).is_empty());
        assert_eq!(threat_assessment(&[]), ThreatAssessment::default());
        assert_eq!(traffic_insights(&[], "TN"), TrafficInsights::default());
        assert_eq!(network_health(None), None);
    }

    #[test]
    fn system_metrics_round_average() {
        let detections = [
            detection(1, "CAM-01", "TN-01-AB-1234", 90, DetectionStatus::Cleared),
            detection(2, "CAM-01", "TN-01-AB-1235", 95, DetectionStatus::Flagged),
        ];
        let cameras = [
            NewCamera::new("CAM-01", "A", CameraStatus::Active).into_camera(RowId::from(1)),
            NewCamera::new("CAM-02", "B", CameraStatus::Maintenance).into_camera(RowId::from(2)),
        ];
        let metrics = system_metrics(&detections, &cameras);
        assert_eq!(metrics.average_confidence, 93);
        assert_eq!(metrics.flagged, 1);
        assert_eq!(metrics.active_ratio, 0.5);
    }

    #[test]
    fn threat_levels_follow_incident_bands() {
        assert_eq!(ThreatLevel::from_incidents(2), ThreatLevel::Low);
        assert_eq!(ThreatLevel::from_incidents(3), ThreatLevel::Medium);
        assert_eq!(ThreatLevel::from_incidents(5), ThreatLevel::Medium);
        assert_eq!(ThreatLevel::from_incidents(6), ThreatLevel::High);
    }

    #[test]
    fn insights_use_newest_ten() {
        let mut detections: Vec<_> = (0..10)
            .map(|i| detection(i, "CAM-04", "DL-AB-1234", 80, DetectionStatus::Cleared))
            .collect();
        detections.push(detection(10, "CAM-01", "TN-01-AB-1234", 80, DetectionStatus::Flagged));

        let insights = traffic_insights(&detections, "TN");
        assert_eq!(insights.sample, 10);
        assert_eq!(insights.out_of_region_pct, 100.0);
        assert_eq!(insights.flagged, 0);
    }

    #[test]
    fn recent_activity_skips_inactive_cameras() {
        let now = DateTime::from_timestamp(1_700_000_100, 0).unwrap();
        let detections = [
            detection(90, "CAM-01", "TN-01-AB-1234", 90, DetectionStatus::Cleared),
            detection(10, "CAM-01", "TN-01-AB-1235", 90, DetectionStatus::Cleared),
        ];
        let cameras = [
            NewCamera::new("CAM-01", "A", CameraStatus::Active).into_camera(RowId::from(1)),
            NewCamera::new("CAM-03", "C", CameraStatus::Maintenance).into_camera(RowId::from(3)),
        ];
        let recent = recent_activity(&cameras, &detections, now, Duration::from_secs(60));
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].recent_detections, 1);
        assert_eq!(recent[0].last_detection, Some(detections[0].timestamp));
    }

    #[test]
    fn report_scores_each_plate_once() {
        let now = DateTime::from_timestamp(1_700_000_100, 0).unwrap();
        let snapshot = CacheSnapshot {
            detections: vec![
                detection(30, "CAM-02", "KA-05-MN-7777", 80, DetectionStatus::Flagged),
                detection(20, "CAM-01", "TN-01-AB-1234", 95, DetectionStatus::Cleared),
                detection(10, "CAM-02", "KA-05-MN-7777", 99, DetectionStatus::Cleared),
            ],
            connected: true,
            ..CacheSnapshot::default()
        };

        let report = MetricsReport::build(
            &snapshot,
            &config::Config::default(),
            &SystemLoad::default(),
            now,
        );
        assert_eq!(
            report.risk,
            ThreatStats {
                total: 2,
                critical: 0,
                high: 0,
                medium: 1,
                low: 1,
                average_confidence: 83.0,
            }
        );
        assert_eq!(report.processing_efficiency, 81.0);
        assert_eq!(report.threat.active_incidents, 1);
    }
}
