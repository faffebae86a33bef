#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::time::Duration;

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Health {
    /// How often the store is probed.
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub store_interval: Duration,

    /// How often the processing service is probed.
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub backend_interval: Duration,

    /// How often a `SystemStats` rollup is published. Zero disables it.
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub stats_interval: Duration,
}

impl Default for Health {
    fn default() -> Self {
        Self {
            store_interval: Duration::from_secs(30),
            backend_interval: Duration::from_secs(15),
            stats_interval: Duration::from_secs(10),
        }
    }
}
