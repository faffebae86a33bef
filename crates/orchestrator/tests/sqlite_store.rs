#![forbid(unsafe_code)]

use orchestrator::domain::{
    CameraStatus, Confidence, DetectionDraft, DetectionStatus, NewCamera, RowId, SystemStatsDraft,
};
use orchestrator::store::{
    ChangeEvent, ChannelId, Column, EventFilter, EventType, NewRow, Query, RemoteStore, Row,
    SqliteStore, StoreError, Table,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::tempdir;

fn draft(plate: &str, camera: &str) -> DetectionDraft {
    DetectionDraft {
        plate_number: plate.into(),
        camera_id: camera.into(),
        confidence: Confidence::saturating(88.0),
        location: "Toll Plaza".into(),
        status: DetectionStatus::Cleared,
        user_id: Some("operator-1".into()),
        image_url: None,
    }
}

#[tokio::test]
async fn sqlite_roundtrip_rows() {
    let dir = tempdir().unwrap();
    let store = SqliteStore::new(dir.path().join("nested/anpr.db")).await.unwrap();
    assert!(store.path().exists());

    store
        .insert(NewRow::Camera(NewCamera::new("CAM-02", "Toll Plaza", CameraStatus::Active)))
        .await
        .unwrap();
    store
        .insert(NewRow::Detection(draft("KA-05-MN-1234", "CAM-02")))
        .await
        .unwrap();
    store
        .insert(NewRow::Detection(draft("TN-22-CD-5678", "CAM-02")))
        .await
        .unwrap();
    store
        .insert(NewRow::SystemStats(SystemStatsDraft {
            active_cameras: 1,
            total_cameras: 1,
            detections_today: 2,
            detections_hour: 2,
            accuracy_rate: 88.0,
            cpu_usage: 45.0,
            memory_usage: 62.0,
            network_latency: 23.0,
        }))
        .await
        .unwrap();

    let cameras = store.select(&Query::all_cameras()).await.unwrap();
    let [Row::Camera(camera)] = cameras.as_slice() else {
        panic!("expected one camera, got {cameras:?}");
    };
    assert_eq!(camera.camera_id, "CAM-02");
    assert_eq!(camera.status, CameraStatus::Active);

    let detections = store.select(&Query::recent_detections(1)).await.unwrap();
    let [Row::Detection(latest)] = detections.as_slice() else {
        panic!("expected one detection, got {detections:?}");
    };
    assert_eq!(latest.plate_number, "TN-22-CD-5678");
    assert_eq!(latest.user_id.as_deref(), Some("operator-1"));
    assert_eq!(latest.confidence.get(), 88);

    let stats = store.select(&Query::latest_stats()).await.unwrap();
    let [Row::SystemStats(stats)] = stats.as_slice() else {
        panic!("expected one stats row");
    };
    assert_eq!(stats.detections_today, 2);
    assert_eq!(stats.cpu_usage, 45.0);
}

#[tokio::test]
async fn reopening_keeps_rows() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("anpr.db");
    {
        let store = SqliteStore::new(path.clone()).await.unwrap();
        store
            .insert(NewRow::Detection(draft("MH-12-AB-0001", "CAM-01")))
            .await
            .unwrap();
    }

    let store = SqliteStore::new(path).await.unwrap();
    let rows = store
        .select(&Query::table(Table::Detections).filter(Column::CameraId, "CAM-01"))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn update_publishes_and_missing_row_is_rejected() {
    let dir = tempdir().unwrap();
    let store = SqliteStore::new(dir.path().join("anpr.db")).await.unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    store
        .subscribe(
            ChannelId::new("detections-test"),
            Table::Detections,
            EventFilter::All,
            Arc::new(move |event: &ChangeEvent| sink.lock().push(event.event_type)),
        )
        .unwrap();

    let Row::Detection(mut detection) = store
        .insert(NewRow::Detection(draft("DL-01-XY-4321", "CAM-05")))
        .await
        .unwrap()
    else {
        panic!("expected a detection row");
    };
    detection.status = DetectionStatus::Flagged;
    store.update(Row::Detection(detection.clone())).await.unwrap();

    let rows = store.select(&Query::recent_detections(10)).await.unwrap();
    let [Row::Detection(stored)] = rows.as_slice() else {
        panic!("expected one detection");
    };
    assert_eq!(stored.status, DetectionStatus::Flagged);
    assert_eq!(*seen.lock(), vec![EventType::Insert, EventType::Update]);

    detection.id = RowId::from(999);
    let err = store.update(Row::Detection(detection)).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { table: Table::Detections, .. }));
    assert_eq!(seen.lock().len(), 2);
}
