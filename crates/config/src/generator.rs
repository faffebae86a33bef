#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Region codes a camera draws plates from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlatePattern {
    pub regions: Vec<String>,
    /// Emit `RR-DD-LL-NNNN` instead of `RR-LL-NNNN`.
    #[serde(default)]
    pub district_code: bool,
}

impl PlatePattern {
    pub fn new<I, S>(regions: I, district_code: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            regions: regions.into_iter().map(Into::into).collect(),
            district_code,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Generator {
    /// Used for cameras without an entry in `camera_patterns`.
    pub default_pattern: PlatePattern,

    pub camera_patterns: BTreeMap<String, PlatePattern>,

    /// Confidence floor of a camera scoring 0.
    pub confidence_floor_min: u8,

    /// Confidence floor of a camera scoring 100.
    pub confidence_floor_max: u8,

    pub flagged_weight: f64,

    pub processing_weight: f64,

    /// Detections below this confidence are always flagged.
    pub flag_below_confidence: Option<u8>,
}

impl Default for Generator {
    fn default() -> Self {
        let camera_patterns = [
            ("CAM-01", PlatePattern::new(["TN"], true)),
            ("CAM-02", PlatePattern::new(["TN", "KA"], true)),
            ("CAM-03", PlatePattern::new(["TN", "AP", "KL"], true)),
            ("CAM-04", PlatePattern::new(["DL", "HR", "UP"], false)),
            ("CAM-05", PlatePattern::new(["MH", "GJ"], false)),
        ]
        .into_iter()
        .map(|(id, pattern)| (id.to_owned(), pattern))
        .collect();

        Self {
            default_pattern: PlatePattern::new(
                ["TN", "KA", "AP", "MH", "DL", "UP", "GJ", "WB"],
                true,
            ),
            camera_patterns,
            confidence_floor_min: 75,
            confidence_floor_max: 90,
            flagged_weight: 0.05,
            processing_weight: 0.05,
            flag_below_confidence: None,
        }
    }
}

impl Generator {
    /// Pattern for `camera_id`, falling back to the default pattern when the
    /// camera is unknown or its entry has no regions.
    pub fn pattern_for(&self, camera_id: &str) -> &PlatePattern {
        match self.camera_patterns.get(camera_id) {
            Some(pattern) if !pattern.regions.is_empty() => pattern,
            _ => &self.default_pattern,
        }
    }
}
