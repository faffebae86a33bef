#![forbid(unsafe_code)]

use orchestrator::RemoteStore;
use orchestrator::domain::{CameraStatus, NewCamera};
use orchestrator::store::{NewRow, Query, StoreError};
use tracing::info;

/// Cameras installed on a fresh deployment.
pub fn demo_cameras() -> Vec<NewCamera> {
    [
        ("CAM-01", "Main Gate", CameraStatus::Active, "192.168.1.101"),
        ("CAM-02", "Toll Plaza", CameraStatus::Active, "192.168.1.102"),
        ("CAM-03", "Highway Junction", CameraStatus::Maintenance, "192.168.1.103"),
        ("CAM-04", "Parking Entrance", CameraStatus::Active, "192.168.1.104"),
        ("CAM-05", "City Center", CameraStatus::Active, "192.168.1.105"),
    ]
    .into_iter()
    .map(|(code, location, status, ip)| NewCamera {
        ip_address: Some(ip.to_owned()),
        ..NewCamera::new(code, location, status)
    })
    .collect()
}

/// Insert [`demo_cameras`] when the cameras table is empty. Returns how many
/// were added.
pub async fn seed_cameras(store: &dyn RemoteStore) -> Result<usize, StoreError> {
    if !store.select(&Query::all_cameras().limit(1)).await?.is_empty() {
        return Ok(0);
    }
    let cameras = demo_cameras();
    let count = cameras.len();
    for camera in cameras {
        store.insert(NewRow::Camera(camera)).await?;
    }
    info!(count, "seeded demo cameras");
    Ok(count)
}
