#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::collections::BTreeMap;
use std::time::Duration;

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Scheduler {
    /// Whether synthetic detections are produced at startup.
    pub live_mode: bool,

    /// Period of the simulation tick in milliseconds.
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub tick: Duration,

    /// Number of cameras handled together before pausing.
    pub batch_size: usize,

    /// Pause between two batches of the same tick in milliseconds.
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub batch_pause: Duration,

    /// Throttle interval for cameras at or above `fast_score_threshold`.
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub fast_interval: Duration,

    /// Throttle interval for every other camera.
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub slow_interval: Duration,

    pub fast_score_threshold: f64,

    /// Simulated traffic density for cameras missing from `camera_probabilities`.
    pub default_probability: f64,

    /// Per-camera chance (0..=1) that an eligible camera emits on a tick.
    pub camera_probabilities: BTreeMap<String, f64>,

    /// Seed for the random source. Entropy is used when unset.
    pub seed: Option<u64>,
}

impl Default for Scheduler {
    fn default() -> Self {
        let camera_probabilities = [
            ("CAM-01", 0.40),
            ("CAM-02", 0.35),
            ("CAM-03", 0.30),
            ("CAM-04", 0.25),
            ("CAM-05", 0.20),
        ]
        .into_iter()
        .map(|(id, p)| (id.to_owned(), p))
        .collect();

        Self {
            live_mode: true,
            tick: Duration::from_millis(2000),
            batch_size: 3,
            batch_pause: Duration::from_millis(500),
            fast_interval: Duration::from_millis(2000),
            slow_interval: Duration::from_millis(3000),
            fast_score_threshold: 80.0,
            default_probability: 0.15,
            camera_probabilities,
            seed: None,
        }
    }
}

impl Scheduler {
    /// Detection probability for `camera_id`, clamped to `0.0..=1.0`.
    pub fn probability_for(&self, camera_id: &str) -> f64 {
        let p = self
            .camera_probabilities
            .get(camera_id)
            .copied()
            .unwrap_or(self.default_probability);
        if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) }
    }

    /// Minimum time between two attempts of a camera with the given score.
    pub fn min_interval(&self, performance_score: f64) -> Duration {
        if performance_score >= self.fast_score_threshold {
            self.fast_interval
        } else {
            self.slow_interval
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn unknown_camera_uses_default_probability() {
        let scheduler = Scheduler::default();
        assert_eq!(scheduler.probability_for("CAM-99"), 0.15);
        assert_eq!(scheduler.probability_for("CAM-01"), 0.40);
    }

    #[test]
    fn higher_score_means_shorter_interval() {
        let scheduler = Scheduler::default();
        assert!(scheduler.min_interval(95.0) < scheduler.min_interval(50.0));
    }

    proptest! {
        #[test]
        fn probability_is_clamped(p in -10.0f64..10.0) {
            let mut scheduler = Scheduler::default();
            scheduler.camera_probabilities.insert("CAM-X".into(), p);
            let clamped = scheduler.probability_for("CAM-X");
            prop_assert!((0.0..=1.0).contains(&clamped));
        }
    }
}
