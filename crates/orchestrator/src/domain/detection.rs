#![forbid(unsafe_code)]

use crate::domain::{Confidence, RowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DetectionStatus {
    #[default]
    Cleared,
    Flagged,
    Processing,
}

impl DetectionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cleared => "cleared",
            Self::Flagged => "flagged",
            Self::Processing => "processing",
        }
    }
}

impl fmt::Display for DetectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetectionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cleared" => Ok(Self::Cleared),
            "flagged" => Ok(Self::Flagged),
            "processing" => Ok(Self::Processing),
            other => Err(format!("unknown detection status `{other}`")),
        }
    }
}

/// One plate-recognition event as stored remotely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub id: RowId,
    pub plate_number: String,
    pub camera_id: String,
    pub confidence: Confidence,
    pub timestamp: DateTime<Utc>,
    pub location: String,
    pub status: DetectionStatus,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl Detection {
    pub fn is_flagged(&self) -> bool {
        self.status == DetectionStatus::Flagged
    }

    /// Region code of the plate, e.g. `TN` for `TN-09-AB-1234`.
    pub fn region(&self) -> &str {
        self.plate_number
            .split('-')
            .next()
            .unwrap_or(&self.plate_number)
    }
}

/// A detection before the store assigned its id and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionDraft {
    pub plate_number: String,
    pub camera_id: String,
    pub confidence: Confidence,
    pub location: String,
    pub status: DetectionStatus,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl DetectionDraft {
    pub fn into_detection(self, id: RowId, timestamp: DateTime<Utc>) -> Detection {
        Detection {
            id,
            plate_number: self.plate_number,
            camera_id: self.camera_id,
            confidence: self.confidence,
            timestamp,
            location: self.location,
            status: self.status,
            user_id: self.user_id,
            image_url: self.image_url,
        }
    }
}
