#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Operator,
    #[default]
    Viewer,
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "operator" => Ok(Self::Operator),
            "viewer" => Ok(Self::Viewer),
            other => Err(format!("unknown role `{other}`")),
        }
    }
}

/// The authenticated principal a view runs as.
///
/// The role only gates presentation; the synchronization layer records the
/// user id on inserts and otherwise treats every session the same.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Role,
}

impl Session {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            role,
        }
    }

    pub fn can_add_detections(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Operator)
    }

    pub fn can_manage_cameras(&self) -> bool {
        self.role == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewer_is_read_only() {
        let viewer = Session::new("u1", Role::Viewer);
        assert!(!viewer.can_add_detections());
        assert!(!viewer.can_manage_cameras());

        let operator = Session::new("u2", "operator".parse().unwrap());
        assert!(operator.can_add_detections());
        assert!(!operator.can_manage_cameras());
    }
}
