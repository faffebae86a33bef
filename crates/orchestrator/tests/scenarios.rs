#![forbid(unsafe_code)]

use async_trait::async_trait;
use orchestrator::cache::SubscriptionManager;
use orchestrator::clock::SystemClock;
use orchestrator::domain::{
    CameraStatus, Confidence, DetectionDraft, DetectionStatus, NewCamera,
};
use orchestrator::processor::{
    ProcessingBackend, ProcessingResult, ProcessingService, ProcessorError, ResultSource,
};
use orchestrator::simulation::{
    DetectionGenerator, EmitOutcome, PerformanceCache, SimulationScheduler,
};
use orchestrator::store::{
    ChangeEvent, MemoryStore, NewRow, Query, RemoteStore, Row, Table,
};
use pretty_assertions::assert_eq;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn demo_cameras() -> Vec<NewCamera> {
    [
        ("CAM-01", "Main Gate", CameraStatus::Active),
        ("CAM-02", "Toll Plaza", CameraStatus::Active),
        ("CAM-03", "Highway Junction", CameraStatus::Maintenance),
        ("CAM-04", "Parking Entrance", CameraStatus::Active),
        ("CAM-05", "City Center", CameraStatus::Active),
    ]
    .into_iter()
    .map(|(code, location, status)| NewCamera::new(code, location, status))
    .collect()
}

fn draft(n: usize) -> DetectionDraft {
    DetectionDraft {
        plate_number: format!("TN-01-AB-{:04}", 1000 + n),
        camera_id: "CAM-01".into(),
        confidence: Confidence::saturating(91.0),
        location: "Main Gate".into(),
        status: DetectionStatus::Cleared,
        user_id: None,
        image_url: None,
    }
}

fn counter() -> (Arc<AtomicUsize>, orchestrator::store::ChangeListener) {
    let seen = Arc::new(AtomicUsize::new(0));
    let hook = seen.clone();
    (
        seen,
        Arc::new(move |_: &ChangeEvent| {
            hook.fetch_add(1, Ordering::SeqCst);
        }),
    )
}

#[tokio::test(start_paused = true)]
async fn maintenance_camera_never_emits() {
    let store = Arc::new(MemoryStore::with_cameras(demo_cameras()));
    let manager = SubscriptionManager::new(store.clone(), "scenario-a", 50);
    assert!(manager.load_all().await.is_complete());
    let cameras = manager.reader().cameras();

    let scheduler_config = config::Scheduler {
        default_probability: 1.0,
        camera_probabilities: Default::default(),
        ..Default::default()
    };
    let mut scheduler = SimulationScheduler::new(
        scheduler_config,
        DetectionGenerator::default(),
        Arc::new(PerformanceCache::default()),
        ChaCha8Rng::seed_from_u64(2024),
    );

    for _ in 0..100 {
        scheduler.tick(&cameras, store.as_ref(), &SystemClock).await;
        tokio::time::advance(Duration::from_secs(3)).await;
    }

    let rows = store.select(&Query::table(Table::Detections)).await.unwrap();
    assert!(!rows.is_empty());
    for row in rows {
        let Row::Detection(detection) = row else {
            panic!("unexpected row {row:?}");
        };
        assert_ne!(detection.camera_id, "CAM-03");
        assert!(detection.confidence.get() <= 100);
    }
}

#[tokio::test]
async fn insert_into_full_cache_evicts_the_tail() {
    let store = Arc::new(MemoryStore::new());
    for n in 0..50 {
        store.insert(NewRow::Detection(draft(n))).await.unwrap();
    }
    let manager = SubscriptionManager::new(store.clone(), "scenario-b", 50);
    manager.load_all().await;
    manager.subscribe(Table::Detections).unwrap();

    let reader = manager.reader();
    let before = reader.detections();
    assert_eq!(before.len(), 50);
    let tail = before[49].id.clone();

    let Row::Detection(inserted) = store.insert(NewRow::Detection(draft(50))).await.unwrap() else {
        panic!("expected a detection row");
    };

    let after = reader.detections();
    assert_eq!(after.len(), 50);
    assert_eq!(after[0].id, inserted.id);
    assert_eq!(after[1].id, before[0].id);
    assert!(after.iter().all(|d| d.id != tail));
}

#[test]
fn ten_failures_decay_score_geometrically() {
    let cache = PerformanceCache::default();
    cache.seed("CAM-01", 95.0);
    let now = tokio::time::Instant::now();
    for _ in 0..10 {
        cache.record("CAM-01", EmitOutcome::Failed, now);
    }

    let score = cache.score("CAM-01");
    assert!((score - 95.0 * 0.95f64.powi(10)).abs() < 1e-9);
    assert!((score - 56.9).abs() < 0.05);
    assert!(score >= 0.0);
    assert_eq!(cache.get("CAM-01").unwrap().detections, 10);
}

struct HangingBackend;

#[async_trait]
impl ProcessingBackend for HangingBackend {
    async fn health(&self) -> Result<serde_json::Value, ProcessorError> {
        Ok(serde_json::json!({ "status": "healthy" }))
    }

    async fn process_image(&self, _image: &str) -> Result<ProcessingResult, ProcessorError> {
        std::future::pending().await
    }

    async fn batch_process(&self, _images: &[String]) -> Result<Vec<ProcessingResult>, ProcessorError> {
        std::future::pending().await
    }
}

#[tokio::test(start_paused = true)]
async fn processing_timeout_falls_back_locally() {
    let service = ProcessingService::new(
        Some(Arc::new(HangingBackend)),
        config::Processor::default(),
        DetectionGenerator::default(),
        ChaCha8Rng::seed_from_u64(5),
    );
    assert!(service.check_health().await);

    let result = service.process_image("aW1hZ2U=").await;
    assert!(result.success);
    assert_eq!(result.source, ResultSource::LocalFallback);
    assert!(result.plates_detected >= 1);
    assert!(result.error.is_some());
    assert_eq!(service.metrics().failed_requests, 1);

    let err = service.batch_process(&["aW1hZ2U=".into()]).await.unwrap_err();
    assert!(matches!(err, ProcessorError::Timeout(_)));
}

#[tokio::test]
async fn two_views_each_receive_an_insert_once() {
    let store = Arc::new(MemoryStore::new());
    let overview = SubscriptionManager::new(store.clone(), "overview", 50);
    let live_feed = SubscriptionManager::new(store.clone(), "live-feed", 50);

    let (seen_a, hook_a) = counter();
    let (seen_b, hook_b) = counter();
    let a = overview.subscribe_with(Table::Detections, hook_a).unwrap();
    let b = live_feed.subscribe_with(Table::Detections, hook_b).unwrap();
    assert_ne!(a.channel(), b.channel());

    store.insert(NewRow::Detection(draft(1))).await.unwrap();

    assert_eq!(seen_a.load(Ordering::SeqCst), 1);
    assert_eq!(seen_b.load(Ordering::SeqCst), 1);
    assert_eq!(overview.reader().detections().len(), 1);
    assert_eq!(live_feed.reader().detections().len(), 1);
}

#[tokio::test]
async fn unsubscribe_twice_is_harmless() {
    let store = Arc::new(MemoryStore::new());
    let manager = SubscriptionManager::new(store.clone(), "teardown", 50);

    let (seen, hook) = counter();
    let handle = manager.subscribe_with(Table::Detections, hook).unwrap();
    manager.unsubscribe(&handle);
    manager.unsubscribe(&handle);
    store.insert(NewRow::Detection(draft(1))).await.unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 0);
    assert_eq!(store.channel_count(), 0);

    let (seen, hook) = counter();
    manager.subscribe_with(Table::Detections, hook).unwrap();
    manager.unsubscribe(&handle);
    store.insert(NewRow::Detection(draft(2))).await.unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}
