#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::time::Duration;

/// External plate-processing service.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Processor {
    /// When false the service is never contacted and every request falls back
    /// to local generation.
    pub enabled: bool,

    pub base_url: String,

    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub health_timeout: Duration,

    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub process_timeout: Duration,

    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub batch_timeout: Duration,

    /// Camera id recorded on detections logged from processed images.
    pub upload_camera_id: String,

    pub upload_location: String,
}

impl Default for Processor {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost:5000".into(),
            health_timeout: Duration::from_secs(5),
            process_timeout: Duration::from_secs(10),
            batch_timeout: Duration::from_secs(30),
            upload_camera_id: "CAM-UPLOAD".into(),
            upload_location: "Image Upload Processing".into(),
        }
    }
}
