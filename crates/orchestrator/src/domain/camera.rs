#![forbid(unsafe_code)]

use crate::domain::RowId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CameraStatus {
    #[default]
    Active,
    Inactive,
    Maintenance,
}

impl CameraStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Maintenance => "maintenance",
        }
    }
}

impl fmt::Display for CameraStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CameraStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "maintenance" => Ok(Self::Maintenance),
            other => Err(format!("unknown camera status `{other}`")),
        }
    }
}

/// A logical capture point. Provisioned outside this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub id: RowId,
    pub camera_id: String,
    pub location: String,
    pub status: CameraStatus,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub last_heartbeat: Option<DateTime<Utc>>,
}

impl Camera {
    pub fn is_active(&self) -> bool {
        self.status == CameraStatus::Active
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCamera {
    pub camera_id: String,
    pub location: String,
    pub status: CameraStatus,
    #[serde(default)]
    pub ip_address: Option<String>,
}

impl NewCamera {
    pub fn new(camera_id: impl Into<String>, location: impl Into<String>, status: CameraStatus) -> Self {
        Self {
            camera_id: camera_id.into(),
            location: location.into(),
            status,
            ip_address: None,
        }
    }

    pub fn into_camera(self, id: RowId) -> Camera {
        Camera {
            id,
            camera_id: self.camera_id,
            location: self.location,
            status: self.status,
            ip_address: self.ip_address,
            last_heartbeat: None,
        }
    }
}
