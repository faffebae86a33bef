#![forbid(unsafe_code)]

use crate::domain::Confidence;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use tokio::time::Instant;
use tracing::trace;

/// Result of one emit attempt as seen by the performance cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitOutcome {
    Inserted { confidence: Confidence },
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceEntry {
    pub last_update: Option<Instant>,
    pub detections: u64,
    pub avg_accuracy: f64,
    pub performance_score: f64,
}

impl PerformanceEntry {
    fn fresh(policy: &config::Performance) -> Self {
        Self {
            last_update: None,
            detections: 0,
            avg_accuracy: policy.initial_accuracy,
            performance_score: policy.initial_score,
        }
    }
}

/// Per-camera feedback signal biasing the simulation.
///
/// Entries are created lazily and only ever leave through [`reset`](Self::reset).
/// Every accessor hands out copies.
#[derive(Debug)]
pub struct PerformanceCache {
    policy: config::Performance,
    entries: Mutex<HashMap<String, PerformanceEntry>>,
}

impl Default for PerformanceCache {
    fn default() -> Self {
        Self::new(config::Performance::default())
    }
}

impl PerformanceCache {
    pub fn new(policy: config::Performance) -> Self {
        Self {
            policy: policy.clamp(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, camera_id: &str) -> Option<PerformanceEntry> {
        self.entries.lock().get(camera_id).copied()
    }

    /// Current score, or the initial score for a camera never seen.
    pub fn score(&self, camera_id: &str) -> f64 {
        self.get(camera_id)
            .map_or(self.policy.initial_score, |e| e.performance_score)
    }

    pub fn last_update(&self, camera_id: &str) -> Option<Instant> {
        self.get(camera_id).and_then(|e| e.last_update)
    }

    /// Fold one attempt into the entry of `camera_id` and return the result.
    pub fn record(&self, camera_id: &str, outcome: EmitOutcome, now: Instant) -> PerformanceEntry {
        let mut entries = self.entries.lock();
        let entry = entries
            .entry(camera_id.to_owned())
            .or_insert_with(|| PerformanceEntry::fresh(&self.policy));

        entry.detections = entry.detections.saturating_add(1);
        entry.last_update = Some(now);
        match outcome {
            EmitOutcome::Inserted { confidence } => {
                let c = f64::from(confidence.get());
                entry.avg_accuracy = (entry.avg_accuracy + c) / 2.0;
                let delta = if confidence.get() > self.policy.high_confidence {
                    self.policy.success_bonus
                } else {
                    -self.policy.low_confidence_penalty
                };
                entry.performance_score += delta;
            }
            EmitOutcome::Failed => {
                entry.performance_score *= self.policy.failure_decay;
            }
        }
        entry.performance_score = clamp_score(entry.performance_score);

        trace!(
            camera_id,
            score = entry.performance_score,
            detections = entry.detections,
            "performance updated"
        );
        *entry
    }

    /// Set the score of `camera_id`, creating the entry if needed.
    pub fn seed(&self, camera_id: &str, performance_score: f64) {
        let mut entries = self.entries.lock();
        let entry = entries
            .entry(camera_id.to_owned())
            .or_insert_with(|| PerformanceEntry::fresh(&self.policy));
        entry.performance_score = clamp_score(performance_score);
    }

    pub fn reset(&self) {
        self.entries.lock().clear();
    }

    pub fn snapshot(&self) -> BTreeMap<String, PerformanceEntry> {
        self.entries
            .lock()
            .iter()
            .map(|(id, entry)| (id.clone(), *entry))
            .collect()
    }
}

fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn inserted(c: u8) -> EmitOutcome {
        EmitOutcome::Inserted {
            confidence: Confidence::saturating(f64::from(c)),
        }
    }

    #[test]
    fn success_blends_accuracy_and_moves_score() {
        let cache = PerformanceCache::default();
        let now = Instant::now();

        let entry = cache.record("CAM-01", inserted(96), now);
        assert_eq!(entry.avg_accuracy, 93.0);
        assert_eq!(entry.performance_score, 91.0);
        assert_eq!(entry.detections, 1);
        assert_eq!(entry.last_update, Some(now));

        let entry = cache.record("CAM-01", inserted(90), now);
        assert_eq!(entry.performance_score, 90.5);
    }

    #[test]
    fn failure_counts_as_attempt() {
        let cache = PerformanceCache::default();
        let entry = cache.record("CAM-02", EmitOutcome::Failed, Instant::now());
        assert_eq!(entry.detections, 1);
        assert!((entry.performance_score - 85.5).abs() < 1e-9);
        assert_eq!(entry.avg_accuracy, 90.0);
    }

    #[test]
    fn reads_are_copies() {
        let cache = PerformanceCache::default();
        cache.seed("CAM-03", 40.0);
        let mut copy = cache.get("CAM-03").unwrap();
        copy.performance_score = 100.0;
        assert_eq!(copy.performance_score, 100.0);
        assert_eq!(cache.score("CAM-03"), 40.0);
        assert_ne!(cache.get("CAM-03"), Some(copy));

        cache.reset();
        assert!(cache.get("CAM-03").is_none());
        assert_eq!(cache.score("CAM-03"), 90.0);
    }

    proptest! {
        #[test]
        fn score_stays_clamped(
            start in -50.0f64..150.0,
            outcomes in proptest::collection::vec(proptest::option::of(0u8..=100), 0..200),
        ) {
            let cache = PerformanceCache::default();
            cache.seed("CAM-01", start);
            let now = Instant::now();
            for outcome in outcomes {
                let outcome = outcome.map_or(EmitOutcome::Failed, inserted);
                let entry = cache.record("CAM-01", outcome, now);
                prop_assert!((0.0..=100.0).contains(&entry.performance_score));
            }
        }
    }
}
