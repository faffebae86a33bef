#![forbid(unsafe_code)]

use crate::clock::Clock;
use crate::domain::{Camera, Detection};
use crate::simulation::{DetectionGenerator, EmitOutcome, PerformanceCache};
use crate::store::{NewRow, RemoteStore, Row};
use futures::future::join_all;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraPhase {
    #[default]
    Idle,
    Eligible,
    Emitting,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    /// Active cameras looked at this tick.
    pub considered: usize,
    pub eligible: usize,
    pub attempted: usize,
    pub failed: usize,
    pub batches: usize,
    pub inserted: Vec<Detection>,
}

/// Shared on/off switch of the simulation.
#[derive(Debug, Clone)]
pub struct LiveMode(Arc<AtomicBool>);

impl LiveMode {
    pub fn new(enabled: bool) -> Self {
        Self(Arc::new(AtomicBool::new(enabled)))
    }

    pub fn is_enabled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn set(&self, enabled: bool) {
        self.0.store(enabled, Ordering::Release);
    }

    /// Flip the switch and return the new state.
    pub fn toggle(&self) -> bool {
        !self.0.fetch_xor(true, Ordering::AcqRel)
    }
}

/// Decides which active cameras emit on a tick and performs the inserts.
///
/// A camera is eligible once its throttle interval elapsed since its last
/// attempt. Eligible cameras roll their traffic probability; winners get a
/// generated detection inserted through the store. Cameras are handled in
/// batches separated by a pause, and the inserts of one batch run
/// concurrently.
pub struct SimulationScheduler {
    config: config::Scheduler,
    generator: DetectionGenerator,
    performance: Arc<PerformanceCache>,
    rng: ChaCha8Rng,
    live: LiveMode,
    phases: HashMap<String, CameraPhase>,
    ticks: u64,
}

impl SimulationScheduler {
    pub fn new(
        config: config::Scheduler,
        generator: DetectionGenerator,
        performance: Arc<PerformanceCache>,
        rng: ChaCha8Rng,
    ) -> Self {
        Self {
            live: LiveMode::new(config.live_mode),
            config,
            generator,
            performance,
            rng,
            phases: HashMap::new(),
            ticks: 0,
        }
    }

    /// Seeded from `scheduler.seed`, or from the thread rng when unset.
    pub fn from_config(config: &config::Config, performance: Arc<PerformanceCache>) -> Self {
        let rng = match config.scheduler.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_rng(&mut rand::rng()),
        };
        Self::new(
            config.scheduler.clone(),
            DetectionGenerator::new(config.generator.clone()),
            performance,
            rng,
        )
    }

    pub fn live_mode(&self) -> LiveMode {
        self.live.clone()
    }

    pub fn generator(&self) -> &DetectionGenerator {
        &self.generator
    }

    /// An independent random stream derived from this scheduler's.
    pub fn fork_rng(&mut self) -> ChaCha8Rng {
        ChaCha8Rng::from_rng(&mut self.rng)
    }

    pub fn phase(&self, camera_id: &str) -> CameraPhase {
        self.phases.get(camera_id).copied().unwrap_or_default()
    }

    fn classify(&self, camera: &Camera, now: Instant) -> CameraPhase {
        if !camera.is_active() {
            return CameraPhase::Idle;
        }
        let interval = self
            .config
            .min_interval(self.performance.score(&camera.camera_id));
        match self.performance.last_update(&camera.camera_id) {
            Some(last) if now.saturating_duration_since(last) < interval => CameraPhase::Idle,
            _ => CameraPhase::Eligible,
        }
    }

    /// Run one scheduling pass over `cameras`.
    ///
    /// Returns early between batches when live mode is switched off; a batch
    /// that already started always completes.
    pub async fn tick(
        &mut self,
        cameras: &[Camera],
        store: &dyn RemoteStore,
        clock: &dyn Clock,
    ) -> TickReport {
        let mut report = TickReport::default();
        if !self.live.is_enabled() {
            return report;
        }
        self.ticks = self.ticks.saturating_add(1);
        report.tick = self.ticks;

        let active: Vec<&Camera> = cameras.iter().filter(|c| c.is_active()).collect();
        report.considered = active.len();

        for (index, batch) in active.chunks(self.config.batch_size()).enumerate() {
            if index > 0 {
                clock.sleep(self.config.batch_pause).await;
                if !self.live.is_enabled() {
                    debug!(tick = report.tick, "live mode off, remaining batches skipped");
                    break;
                }
            }
            report.batches += 1;
            self.run_batch(batch, store, clock.now(), &mut report).await;
        }

        if report.attempted > 0 {
            debug!(
                tick = report.tick,
                attempted = report.attempted,
                inserted = report.inserted.len(),
                failed = report.failed,
                "simulation tick"
            );
        }
        report
    }

    async fn run_batch(
        &mut self,
        batch: &[&Camera],
        store: &dyn RemoteStore,
        now: Instant,
        report: &mut TickReport,
    ) {
        let mut emitting = Vec::new();
        for camera in batch {
            let phase = self.classify(camera, now);
            self.phases.insert(camera.camera_id.clone(), phase);
            if phase != CameraPhase::Eligible {
                continue;
            }
            report.eligible += 1;

            let probability = self.config.probability_for(&camera.camera_id);
            if !self.rng.random_bool(probability) {
                continue;
            }
            let score = self.performance.score(&camera.camera_id);
            let draft = self.generator.generate(camera, score, &mut self.rng);
            self.phases
                .insert(camera.camera_id.clone(), CameraPhase::Emitting);
            emitting.push((camera.camera_id.clone(), draft));
        }
        if emitting.is_empty() {
            return;
        }

        report.attempted += emitting.len();
        let inserts = emitting
            .iter()
            .map(|(_, draft)| store.insert(NewRow::Detection(draft.clone())));
        let results = join_all(inserts).await;

        for ((camera_id, draft), result) in emitting.into_iter().zip(results) {
            let outcome = match result {
                Ok(Row::Detection(detection)) => {
                    report.inserted.push(detection);
                    EmitOutcome::Inserted {
                        confidence: draft.confidence,
                    }
                }
                Ok(other) => {
                    warn!(%camera_id, table = %other.table(), "insert returned a foreign row");
                    EmitOutcome::Inserted {
                        confidence: draft.confidence,
                    }
                }
                Err(err) => {
                    report.failed += 1;
                    debug!(%camera_id, error = %err, "synthetic insert failed");
                    EmitOutcome::Failed
                }
            };
            self.performance.record(&camera_id, outcome, now);
            self.phases.insert(camera_id, CameraPhase::Idle);
        }
    }

    pub fn set_live(&self, enabled: bool) {
        if self.live.is_enabled() != enabled {
            info!(enabled, "live mode changed");
        }
        self.live.set(enabled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::domain::{CameraStatus, NewCamera, RowId};
    use crate::store::{MemoryStore, Table};
    use std::time::Duration;

    fn scheduler(config: config::Scheduler) -> SimulationScheduler {
        SimulationScheduler::new(
            config,
            DetectionGenerator::default(),
            Arc::new(PerformanceCache::default()),
            ChaCha8Rng::seed_from_u64(42),
        )
    }

    fn always() -> config::Scheduler {
        config::Scheduler {
            default_probability: 1.0,
            camera_probabilities: Default::default(),
            ..Default::default()
        }
    }

    fn camera(id: i64, code: &str, status: CameraStatus) -> Camera {
        NewCamera::new(code, "Toll Plaza", status).into_camera(RowId::from(id))
    }

    #[tokio::test(start_paused = true)]
    async fn throttle_blocks_until_interval_elapsed() {
        let store = MemoryStore::new();
        let mut scheduler = scheduler(always());
        let cameras = [camera(1, "CAM-01", CameraStatus::Active)];

        let first = scheduler.tick(&cameras, &store, &SystemClock).await;
        assert_eq!(first.inserted.len(), 1);

        let second = scheduler.tick(&cameras, &store, &SystemClock).await;
        assert_eq!(second.eligible, 0);
        assert_eq!(scheduler.phase("CAM-01"), CameraPhase::Idle);

        tokio::time::advance(Duration::from_secs(3)).await;
        let third = scheduler.tick(&cameras, &store, &SystemClock).await;
        assert_eq!(third.inserted.len(), 1);
        assert_eq!(store.row_count(Table::Detections), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn batches_are_separated_by_a_pause() {
        let store = MemoryStore::new();
        let mut scheduler = scheduler(always());
        let cameras: Vec<_> = (1..=7)
            .map(|i| camera(i, &format!("CAM-{i:02}"), CameraStatus::Active))
            .collect();

        let start = Instant::now();
        let report = scheduler.tick(&cameras, &store, &SystemClock).await;
        assert_eq!(report.batches, 3);
        assert_eq!(report.attempted, 7);
        assert_eq!(start.elapsed(), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn live_mode_off_mid_tick_finishes_current_batch() {
        let store = MemoryStore::new();
        let mut scheduler = scheduler(always());
        let live = scheduler.live_mode();
        let cameras: Vec<_> = (1..=7)
            .map(|i| camera(i, &format!("CAM-{i:02}"), CameraStatus::Active))
            .collect();

        let switch_off = async {
            tokio::time::sleep(Duration::from_millis(250)).await;
            live.set(false);
        };
        let (report, ()) = tokio::join!(scheduler.tick(&cameras, &store, &SystemClock), switch_off);

        assert_eq!(report.batches, 1);
        assert_eq!(report.attempted, 3);
        assert_eq!(report.inserted.len(), 3);
        assert_eq!(store.row_count(Table::Detections), 3);
        assert_eq!(scheduler.phase("CAM-04"), CameraPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_insert_is_absorbed() {
        let store = MemoryStore::new();
        store.set_reject_inserts(true);
        let performance = Arc::new(PerformanceCache::default());
        let mut scheduler = SimulationScheduler::new(
            always(),
            DetectionGenerator::default(),
            performance.clone(),
            ChaCha8Rng::seed_from_u64(3),
        );

        let report = scheduler
            .tick(&[camera(1, "CAM-01", CameraStatus::Active)], &store, &SystemClock)
            .await;
        assert_eq!(report.failed, 1);
        let entry = performance.get("CAM-01").unwrap();
        assert_eq!(entry.detections, 1);
        assert!((entry.performance_score - 85.5).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn live_mode_off_skips_tick() {
        let store = MemoryStore::new();
        let scheduler_config = config::Scheduler {
            live_mode: false,
            ..always()
        };
        let mut scheduler = scheduler(scheduler_config);
        let report = scheduler
            .tick(&[camera(1, "CAM-01", CameraStatus::Active)], &store, &SystemClock)
            .await;
        assert_eq!(report, TickReport::default());

        assert!(scheduler.live_mode().toggle());
        let report = scheduler
            .tick(&[camera(1, "CAM-01", CameraStatus::Active)], &store, &SystemClock)
            .await;
        assert_eq!(report.attempted, 1);
    }
}
