#![forbid(unsafe_code)]

//! Per-plate risk scoring over the cached detections.

use crate::domain::{Detection, RowId};
use chrono::{DateTime, TimeDelta, Timelike, Utc};
use itertools::Itertools;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_score(score: u32, policy: &config::Risk) -> Self {
        if score > policy.critical_above {
            Self::Critical
        } else if score > policy.high_above {
            Self::High
        } else if score > policy.medium_above {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFactor {
    OutOfRegion,
    UnusualHour,
    RapidRepeat,
    LowConfidence,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAssessment {
    pub plate_number: String,
    /// The sighting that was scored.
    pub detection_id: RowId,
    pub score: u32,
    pub level: RiskLevel,
    /// Certainty of the assessment itself, `70 + score / 2` capped at 95.
    pub confidence: f64,
    pub factors: Vec<RiskFactor>,
    pub timestamp: DateTime<Utc>,
}

/// Score `detection` against the other cached sightings.
///
/// `history` is the cached detection list; sightings of the same plate newer
/// than `now - repeat_window` count toward the repeat factor, `detection`
/// included.
pub fn assess_detection(
    detection: &Detection,
    history: &[Detection],
    now: DateTime<Utc>,
    home_region: &str,
    policy: &config::Risk,
) -> RiskAssessment {
    let mut factors = Vec::new();

    if detection.region() != home_region {
        factors.push(RiskFactor::OutOfRegion);
    }

    let hour = detection.timestamp.hour();
    if hour < policy.quiet_hours_end || hour > policy.quiet_hours_start {
        factors.push(RiskFactor::UnusualHour);
    }

    let window = TimeDelta::from_std(policy.repeat_window).unwrap_or(TimeDelta::MAX);
    let cutoff = now.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC);
    let sightings = history
        .iter()
        .filter(|d| d.plate_number == detection.plate_number && d.timestamp > cutoff)
        .count();
    if sightings > policy.repeat_threshold {
        factors.push(RiskFactor::RapidRepeat);
    }

    if detection.confidence.get() < policy.low_confidence_below {
        factors.push(RiskFactor::LowConfidence);
    }

    let score = factors
        .iter()
        .map(|factor| match factor {
            RiskFactor::OutOfRegion => policy.out_of_region_weight,
            RiskFactor::UnusualHour => policy.unusual_hour_weight,
            RiskFactor::RapidRepeat => policy.repeat_weight,
            RiskFactor::LowConfidence => policy.low_confidence_weight,
        })
        .fold(0u32, u32::saturating_add);

    RiskAssessment {
        plate_number: detection.plate_number.clone(),
        detection_id: detection.id.clone(),
        score,
        level: RiskLevel::from_score(score, policy),
        confidence: (70.0 + f64::from(score) / 2.0).min(95.0),
        factors,
        timestamp: detection.timestamp,
    }
}

/// One assessment per distinct plate, scored on its newest sighting.
///
/// `detections` is most-recent-first, as held by the cache.
pub fn assess_plates(
    detections: &[Detection],
    now: DateTime<Utc>,
    home_region: &str,
    policy: &config::Risk,
) -> Vec<RiskAssessment> {
    detections
        .iter()
        .unique_by(|d| d.plate_number.as_str())
        .map(|d| assess_detection(d, detections, now, home_region, policy))
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ThreatStats {
    pub total: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    /// Mean assessment confidence, rounded.
    pub average_confidence: f64,
}

pub fn threat_stats(assessments: &[RiskAssessment]) -> ThreatStats {
    let counts = assessments.iter().counts_by(|a| a.level);
    let count = |level: RiskLevel| counts.get(&level).copied().unwrap_or(0);
    let average_confidence = if assessments.is_empty() {
        0.0
    } else {
        (assessments.iter().map(|a| a.confidence).sum::<f64>() / assessments.len() as f64).round()
    };
    ThreatStats {
        total: assessments.len(),
        critical: count(RiskLevel::Critical),
        high: count(RiskLevel::High),
        medium: count(RiskLevel::Medium),
        low: count(RiskLevel::Low),
        average_confidence,
    }
}
