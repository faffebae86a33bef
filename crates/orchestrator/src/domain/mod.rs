#![forbid(unsafe_code)]

mod camera;
mod detection;
mod ids;
mod session;
mod stats;

pub use camera::{Camera, CameraStatus, NewCamera};
pub use detection::{Detection, DetectionDraft, DetectionStatus};
pub use ids::{Confidence, RowId};
pub use session::{Role, Session};
pub use stats::{SystemStats, SystemStatsDraft};
