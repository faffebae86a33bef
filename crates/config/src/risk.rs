#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::time::Duration;

/// Weights and bands of the per-plate risk score.
///
/// A plate collects the weight of every factor it matches; the sum is then
/// placed in a band (`score > critical_above` is critical, and so on).
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Risk {
    /// Plate registered outside `cache.home_region`.
    pub out_of_region_weight: u32,

    /// Sighting before `quiet_hours_end` or after `quiet_hours_start` (UTC hour).
    pub unusual_hour_weight: u32,
    pub quiet_hours_start: u32,
    pub quiet_hours_end: u32,

    /// More than `repeat_threshold` sightings of one plate within `repeat_window`.
    pub repeat_weight: u32,
    pub repeat_threshold: usize,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub repeat_window: Duration,

    /// Recognition confidence strictly below `low_confidence_below`.
    pub low_confidence_weight: u32,
    pub low_confidence_below: u8,

    pub medium_above: u32,
    pub high_above: u32,
    pub critical_above: u32,
}

impl Default for Risk {
    fn default() -> Self {
        Self {
            out_of_region_weight: 30,
            unusual_hour_weight: 25,
            quiet_hours_start: 23,
            quiet_hours_end: 5,
            repeat_weight: 40,
            repeat_threshold: 3,
            repeat_window: Duration::from_secs(300),
            low_confidence_weight: 20,
            low_confidence_below: 85,
            medium_above: 30,
            high_above: 60,
            critical_above: 80,
        }
    }
}

impl Risk {
    /// True when the bands grow strictly from medium to critical.
    pub fn bands_are_ordered(&self) -> bool {
        self.medium_above < self.high_above && self.high_above < self.critical_above
    }
}
