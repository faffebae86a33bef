#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Performance {
    /// Score given to a camera the first time it is seen.
    pub initial_score: f64,

    /// Running accuracy a new camera starts from.
    pub initial_accuracy: f64,

    /// Confidences strictly above this count as high-confidence successes.
    pub high_confidence: u8,

    pub success_bonus: f64,

    pub low_confidence_penalty: f64,

    /// Multiplier applied to the score after a failed insert.
    pub failure_decay: f64,
}

impl Default for Performance {
    fn default() -> Self {
        Self {
            initial_score: 90.0,
            initial_accuracy: 90.0,
            high_confidence: 90,
            success_bonus: 1.0,
            low_confidence_penalty: 0.5,
            failure_decay: 0.95,
        }
    }
}

impl Performance {
    pub fn clamp(self) -> Self {
        Self {
            initial_score: self.initial_score.clamp(0.0, 100.0),
            initial_accuracy: self.initial_accuracy.clamp(0.0, 100.0),
            high_confidence: self.high_confidence.min(100),
            failure_decay: self.failure_decay.clamp(0.0, 1.0),
            ..self
        }
    }
}
