#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::path::PathBuf;
use std::time::Duration;

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Cache {
    /// Maximum number of detections mirrored in memory.
    pub detection_limit: usize,

    /// Region treated as local by the traffic insights view.
    pub home_region: String,

    /// Trailing window used for per-camera recent activity.
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub activity_window: Duration,
}

impl Default for Cache {
    fn default() -> Self {
        Self {
            detection_limit: 50,
            home_region: "TN".into(),
            activity_window: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Store {
    /// SQLite database backing the store. An in-memory store is used when unset.
    pub database: Option<PathBuf>,
}
