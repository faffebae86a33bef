#![forbid(unsafe_code)]

use crate::cache::{CacheReader, LoadReport, SubscriptionManager};
use crate::clock::Clock;
use crate::domain::{Detection, DetectionDraft, DetectionStatus, RowId, Session, SystemStats};
use crate::error::Error;
use crate::health::{ConnectionHealth, HealthMonitor, probe_store};
use crate::metrics::MetricsReport;
use crate::notice::Notice;
use crate::processor::{ProcessingBackend, ProcessingResult, ProcessingService};
use crate::simulation::{
    DetectionTally, LiveMode, PerformanceCache, SimulationScheduler, SystemLoad, TickReport,
    rollup,
};
use crate::store::{ChangeEvent, EventType, NewRow, RemoteStore, Row, Table};
use config::Config;
use parking_lot::Mutex;
use rand_chacha::ChaCha8Rng;
use std::future::pending;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{Interval, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const NOTICE_CAPACITY: usize = 32;

pub struct Services {
    pub store: Arc<dyn RemoteStore>,
    /// Processing microservice. `None` answers every image locally.
    pub backend: Option<Arc<dyn ProcessingBackend>>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    SetLiveMode(bool),
    ToggleLiveMode,
    ResetPerformance,
    /// Log every metrics view as JSON.
    DumpMetrics,
}

enum Wake {
    Shutdown,
    Control(ControlEvent),
    Tick,
    StoreCheck,
    BackendCheck,
    Stats,
}

/// Live synchronization layer of one dashboard session.
///
/// Owns the entity caches, the simulation scheduler and the performance
/// cache, and multiplexes their timers on a single loop in
/// [`run_until`](Self::run_until).
pub struct LiveSyncEngine {
    config: Config,
    session: Option<Session>,
    services: Services,
    subscriptions: SubscriptionManager,
    reader: CacheReader,
    scheduler: SimulationScheduler,
    performance: Arc<PerformanceCache>,
    processing: ProcessingService,
    health: HealthMonitor,
    load: SystemLoad,
    tally: Arc<Mutex<DetectionTally>>,
    rng: ChaCha8Rng,
    notices: broadcast::Sender<Notice>,
    started: bool,
}

impl LiveSyncEngine {
    /// Build the engine. Nothing is loaded until [`start`](Self::start).
    pub fn new(config: Config, session: Option<Session>, services: Services) -> Self {
        let performance = Arc::new(PerformanceCache::new(config.performance));
        let mut scheduler = SimulationScheduler::from_config(&config, Arc::clone(&performance));
        let rng = scheduler.fork_rng();
        let processing = ProcessingService::new(
            services.backend.clone(),
            config.processor.clone(),
            scheduler.generator().clone(),
            scheduler.fork_rng(),
        );
        let subscriptions = SubscriptionManager::new(
            Arc::clone(&services.store),
            "engine",
            config.cache.detection_limit,
        );
        let reader = subscriptions.reader();
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);

        Self {
            config,
            session,
            services,
            subscriptions,
            reader,
            scheduler,
            performance,
            processing,
            health: HealthMonitor::new(),
            load: SystemLoad::default(),
            tally: Arc::new(Mutex::new(DetectionTally::default())),
            rng,
            notices,
            started: false,
        }
    }

    /// Load the initial snapshots, then follow every table.
    ///
    /// Load failures leave the caches empty and the layer disconnected but
    /// do not fail the start.
    pub async fn start(&mut self) -> Result<LoadReport, Error> {
        let report = self.subscriptions.load_all().await;
        for failure in &report.failures {
            warn!(table = %failure.table, reason = %failure.reason, "starting without snapshot");
        }
        let now = self.services.clock.wall();
        if let Some(notice) = self.health.record_store(report.is_complete(), now) {
            self.notify(notice);
        }

        if !self.started {
            let tally = Arc::clone(&self.tally);
            self.subscriptions.subscribe_with(
                Table::Detections,
                Arc::new(move |event: &ChangeEvent| {
                    if let (EventType::Insert, Row::Detection(d)) = (event.event_type, &event.row) {
                        tally.lock().record(d.timestamp);
                    }
                }),
            )?;
            self.subscriptions.subscribe(Table::Cameras)?;
            self.subscriptions.subscribe(Table::SystemStats)?;
            self.started = true;
        }

        self.check_backend().await;
        info!(
            detections = self.reader.detections().len(),
            cameras = self.reader.cameras().len(),
            connected = self.reader.is_connected(),
            "live sync started"
        );
        Ok(report)
    }

    /// One simulation pass over the cached cameras.
    pub async fn tick(&mut self) -> TickReport {
        self.load.step(&mut self.rng);
        let cameras = self.reader.cameras();
        self.scheduler
            .tick(
                &cameras,
                self.services.store.as_ref(),
                self.services.clock.as_ref(),
            )
            .await
    }

    /// Drive ticks, health checks and stats publishing until `cancel` fires.
    pub async fn run_until(
        &mut self,
        cancel: CancellationToken,
        mut control_rx: mpsc::UnboundedReceiver<ControlEvent>,
    ) -> Result<(), Error> {
        if !self.started {
            self.start().await?;
        }

        let mut ticks = every(self.config.scheduler.tick);
        let mut store_checks = every(self.config.health.store_interval);
        let mut backend_checks = every(self.config.health.backend_interval);
        let mut stats = every(self.config.health.stats_interval);

        loop {
            let wake = tokio::select! {
                _ = cancel.cancelled() => Wake::Shutdown,
                Some(event) = control_rx.recv() => Wake::Control(event),
                _ = next(&mut ticks) => Wake::Tick,
                _ = next(&mut store_checks) => Wake::StoreCheck,
                _ = next(&mut backend_checks) => Wake::BackendCheck,
                _ = next(&mut stats) => Wake::Stats,
            };

            // Work runs outside `select!` so a started batch is never dropped.
            match wake {
                Wake::Shutdown => {
                    info!("shutdown requested");
                    break;
                }
                Wake::Control(event) => self.handle_control(event),
                Wake::Tick => {
                    self.tick().await;
                }
                Wake::StoreCheck => self.check_store().await,
                Wake::BackendCheck => self.check_backend().await,
                Wake::Stats => {
                    if let Err(err) = self.publish_stats().await {
                        debug!(error = %err, "stats rollup not published");
                    }
                }
            }
        }

        self.shutdown();
        Ok(())
    }

    /// Insert a detection on behalf of the session user ("Add Vehicle").
    ///
    /// Unlike synthetic inserts, a failure is returned and announced as a
    /// notice.
    pub async fn add_detection(&self, mut draft: DetectionDraft) -> Result<Detection, Error> {
        if draft.user_id.is_none() {
            draft.user_id = self.session.as_ref().map(|s| s.user_id.clone());
        }
        let plate = draft.plate_number.clone();
        match self.services.store.insert(NewRow::Detection(draft)).await {
            Ok(Row::Detection(detection)) => {
                self.notify(Notice::info(format!("Vehicle {plate} added")));
                Ok(detection)
            }
            Ok(other) => Err(Error::TableMismatch {
                expected: Table::Detections,
                actual: other.table(),
            }),
            Err(err) => {
                self.notify(Notice::error(format!("Failed to add vehicle {plate}: {err}")));
                Err(err.into())
            }
        }
    }

    /// Move a cached detection to `status` through an update.
    pub async fn update_detection_status(
        &self,
        id: &RowId,
        status: DetectionStatus,
    ) -> Result<Detection, Error> {
        let mut detection = self
            .reader
            .detection(id)
            .ok_or_else(|| Error::UnknownDetection(id.clone()))?;
        detection.status = status;
        match self.services.store.update(Row::Detection(detection)).await? {
            Row::Detection(updated) => Ok(updated),
            other => Err(Error::TableMismatch {
                expected: Table::Detections,
                actual: other.table(),
            }),
        }
    }

    /// Publish a stats rollup of the current caches and simulated load.
    pub async fn publish_stats(&mut self) -> Result<SystemStats, Error> {
        let snapshot = self.reader.snapshot();
        let draft = rollup(
            &snapshot.cameras,
            &snapshot.detections,
            &self.load,
            &mut self.tally.lock(),
            self.services.clock.wall(),
        );
        match self.services.store.insert(NewRow::SystemStats(draft)).await? {
            Row::SystemStats(stats) => Ok(stats),
            other => Err(Error::TableMismatch {
                expected: Table::SystemStats,
                actual: other.table(),
            }),
        }
    }

    /// Process an uploaded image. Falls back to local generation.
    pub async fn process_image(&self, image: &str) -> ProcessingResult {
        self.processing.process_image(image).await
    }

    /// Record the readings of `result` as detections.
    pub async fn log_processing(&self, result: &ProcessingResult) -> usize {
        self.processing
            .log_results(result, self.services.store.as_ref(), self.session.as_ref())
            .await
    }

    pub async fn check_store(&self) {
        let ok = probe_store(
            self.services.store.as_ref(),
            self.config.processor.health_timeout,
        )
        .await;
        if let Some(notice) = self.health.record_store(ok, self.services.clock.wall()) {
            self.notify(notice);
        }
    }

    pub async fn check_backend(&self) {
        let ok = self.processing.check_health().await;
        if let Some(notice) = self.health.record_backend(ok, self.services.clock.wall()) {
            self.notify(notice);
        }
    }

    pub fn metrics(&self) -> MetricsReport {
        MetricsReport::build(
            &self.reader.snapshot(),
            &self.config,
            &self.load,
            self.services.clock.wall(),
        )
    }

    pub fn reader(&self) -> CacheReader {
        self.reader.clone()
    }

    pub fn performance(&self) -> Arc<PerformanceCache> {
        Arc::clone(&self.performance)
    }

    pub fn processing(&self) -> &ProcessingService {
        &self.processing
    }

    pub fn live_mode(&self) -> LiveMode {
        self.scheduler.live_mode()
    }

    pub fn health(&self) -> watch::Receiver<ConnectionHealth> {
        self.health.subscribe()
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Close every subscription. Safe to call more than once.
    pub fn shutdown(&mut self) {
        self.subscriptions.unsubscribe_all();
        self.started = false;
    }

    fn handle_control(&mut self, event: ControlEvent) {
        match event {
            ControlEvent::SetLiveMode(enabled) => self.scheduler.set_live(enabled),
            ControlEvent::ToggleLiveMode => {
                let enabled = self.scheduler.live_mode().toggle();
                info!(enabled, "live mode toggled");
            }
            ControlEvent::ResetPerformance => {
                self.performance.reset();
                info!("performance cache reset");
            }
            ControlEvent::DumpMetrics => match serde_json::to_string(&self.metrics()) {
                Ok(json) => info!(metrics = %json, "metrics dump"),
                Err(err) => warn!(error = %err, "metrics dump failed"),
            },
        }
    }

    fn notify(&self, notice: Notice) {
        debug!(%notice, "notice");
        // No receiver is fine.
        let _ = self.notices.send(notice);
    }
}

/// Interval firing every `period`, or `None` when `period` is zero.
fn every(period: Duration) -> Option<Interval> {
    (!period.is_zero()).then(|| {
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    })
}

async fn next(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending().await,
    }
}
