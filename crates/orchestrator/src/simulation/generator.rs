#![forbid(unsafe_code)]

use crate::domain::{Camera, Confidence, DetectionDraft, DetectionStatus};
use rand::Rng;

/// Builds plausible detections for a camera without any image input.
#[derive(Debug, Clone, Default)]
pub struct DetectionGenerator {
    config: config::Generator,
}

impl DetectionGenerator {
    pub fn new(config: config::Generator) -> Self {
        Self { config }
    }

    /// A draft for `camera` whose confidence floor follows `performance_score`.
    ///
    /// Pure apart from the draws taken from `rng`.
    pub fn generate<R: Rng>(
        &self,
        camera: &Camera,
        performance_score: f64,
        rng: &mut R,
    ) -> DetectionDraft {
        let floor = self.confidence_floor(performance_score);
        let confidence = Confidence::saturating(f64::from(rng.random_range(floor..=100u8)));
        DetectionDraft {
            plate_number: self.plate(&camera.camera_id, rng),
            camera_id: camera.camera_id.clone(),
            confidence,
            location: camera.location.clone(),
            status: self.status(confidence, rng),
            user_id: None,
            image_url: None,
        }
    }

    /// Plate drawn from the region table of `camera_id`.
    pub fn plate<R: Rng>(&self, camera_id: &str, rng: &mut R) -> String {
        let pattern = self.config.pattern_for(camera_id);
        let region = if pattern.regions.is_empty() {
            "TN"
        } else {
            pattern.regions[rng.random_range(0..pattern.regions.len())].as_str()
        };
        let letters: String = (0..2)
            .map(|_| char::from(b'A' + rng.random_range(0..26u8)))
            .collect();
        let digits = rng.random_range(1000..=9999u16);

        if pattern.district_code {
            let district = rng.random_range(1..=99u8);
            format!("{region}-{district:02}-{letters}-{digits}")
        } else {
            format!("{region}-{letters}-{digits}")
        }
    }

    /// Lowest confidence a camera with `performance_score` may report.
    pub fn confidence_floor(&self, performance_score: f64) -> u8 {
        let min = f64::from(self.config.confidence_floor_min.min(100));
        let max = f64::from(self.config.confidence_floor_max.clamp(
            self.config.confidence_floor_min.min(100),
            100,
        ));
        let score = if performance_score.is_nan() {
            0.0
        } else {
            performance_score.clamp(0.0, 100.0)
        };
        (min + (max - min) * score / 100.0).round() as u8
    }

    fn status<R: Rng>(&self, confidence: Confidence, rng: &mut R) -> DetectionStatus {
        if let Some(threshold) = self.config.flag_below_confidence
            && confidence.get() < threshold
        {
            return DetectionStatus::Flagged;
        }
        let flagged = self.config.flagged_weight.max(0.0);
        let processing = self.config.processing_weight.max(0.0);
        let roll: f64 = rng.random();
        if roll < flagged {
            DetectionStatus::Flagged
        } else if roll < flagged + processing {
            DetectionStatus::Processing
        } else {
            DetectionStatus::Cleared
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CameraStatus, NewCamera, RowId};
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn camera(code: &str) -> Camera {
        NewCamera::new(code, "Highway Junction", CameraStatus::Active).into_camera(RowId::from(1))
    }

    #[test]
    fn plate_follows_camera_pattern() {
        let generator = DetectionGenerator::default();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..50 {
            let plate = generator.plate("CAM-01", &mut rng);
            let parts: Vec<_> = plate.split('-').collect();
            assert_eq!(parts.len(), 4, "{plate}");
            assert_eq!(parts[0], "TN");
            assert_eq!(parts[3].len(), 4);

            let plate = generator.plate("CAM-05", &mut rng);
            assert_eq!(plate.split('-').count(), 3, "{plate}");
        }
    }

    #[test]
    fn floor_rises_with_score() {
        let generator = DetectionGenerator::default();
        assert_eq!(generator.confidence_floor(0.0), 75);
        assert_eq!(generator.confidence_floor(100.0), 90);
        assert!(generator.confidence_floor(50.0) < generator.confidence_floor(90.0));
    }

    #[test]
    fn low_confidence_is_flagged_when_configured() {
        let generator = DetectionGenerator::new(config::Generator {
            confidence_floor_min: 0,
            confidence_floor_max: 0,
            flagged_weight: 0.0,
            processing_weight: 0.0,
            flag_below_confidence: Some(101),
            ..Default::default()
        });
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let draft = generator.generate(&camera("CAM-02"), 0.0, &mut rng);
        assert_eq!(draft.status, DetectionStatus::Flagged);
    }

    proptest! {
        #[test]
        fn confidence_stays_between_floor_and_max(seed in any::<u64>(), score in -50.0f64..150.0) {
            let generator = DetectionGenerator::default();
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let draft = generator.generate(&camera("CAM-03"), score, &mut rng);
            prop_assert!(draft.confidence.get() >= generator.confidence_floor(score));
            prop_assert!(draft.confidence.get() <= 100);
            prop_assert_eq!(draft.camera_id, "CAM-03");
        }
    }
}
