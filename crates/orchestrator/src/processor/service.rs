#![forbid(unsafe_code)]

use crate::domain::{Confidence, DetectionDraft, DetectionStatus, Session};
use crate::processor::{
    ConnectionMetrics, PlateReading, ProcessingBackend, ProcessingResult, ProcessorError,
    ResultSource, plate,
};
use crate::simulation::DetectionGenerator;
use crate::store::{NewRow, RemoteStore};
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Readings below this confidence are reported invalid by the fallback.
const FALLBACK_VALID_CONFIDENCE: f64 = 85.0;

/// Front of the processing backend that never fails an image request.
///
/// When the backend is disabled, marked unreachable, times out or errors,
/// [`process_image`](Self::process_image) answers with locally generated
/// readings instead.
pub struct ProcessingService {
    backend: Option<Arc<dyn ProcessingBackend>>,
    config: config::Processor,
    generator: DetectionGenerator,
    rng: Mutex<ChaCha8Rng>,
    connected: AtomicBool,
    metrics: Mutex<ConnectionMetrics>,
}

impl ProcessingService {
    pub fn new(
        backend: Option<Arc<dyn ProcessingBackend>>,
        config: config::Processor,
        generator: DetectionGenerator,
        rng: ChaCha8Rng,
    ) -> Self {
        let backend = if config.enabled { backend } else { None };
        Self {
            backend,
            config,
            generator,
            rng: Mutex::new(rng),
            connected: AtomicBool::new(false),
            metrics: Mutex::new(ConnectionMetrics::default()),
        }
    }

    /// Service without any backend; every request is answered locally.
    pub fn offline(generator: DetectionGenerator) -> Self {
        Self::new(
            None,
            config::Processor {
                enabled: false,
                ..Default::default()
            },
            generator,
            ChaCha8Rng::from_rng(&mut rand::rng()),
        )
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn metrics(&self) -> ConnectionMetrics {
        *self.metrics.lock()
    }

    /// Probe `/health`. A timeout counts as a failed check.
    pub async fn check_health(&self) -> bool {
        let Some(backend) = &self.backend else {
            return false;
        };
        let started = Instant::now();
        let healthy = match timeout(self.config.health_timeout, backend.health()).await {
            Ok(Ok(health)) => {
                debug!(%health, "processing backend healthy");
                self.metrics.lock().record_success(started.elapsed());
                true
            }
            Ok(Err(err)) => {
                debug!(error = %err, "processing backend health check failed");
                self.metrics.lock().record_failure();
                false
            }
            Err(_) => {
                debug!(timeout = ?self.config.health_timeout, "processing backend health check timed out");
                self.metrics.lock().record_failure();
                false
            }
        };
        if self.connected.swap(healthy, Ordering::AcqRel) != healthy {
            info!(connected = healthy, "processing backend status changed");
        }
        healthy
    }

    /// Process one base64 image. Never returns an error.
    pub async fn process_image(&self, image: &str) -> ProcessingResult {
        let started = Instant::now();
        let backend = match &self.backend {
            Some(backend) if self.is_connected() => backend,
            _ => return self.fallback(started, None),
        };

        let error = match timeout(self.config.process_timeout, backend.process_image(image)).await {
            Ok(Ok(mut result)) => {
                let elapsed = started.elapsed();
                self.metrics.lock().record_success(elapsed);
                result.processing_time = Some(elapsed.as_secs_f64());
                result.source = ResultSource::Backend;
                return result;
            }
            Ok(Err(err)) => err,
            Err(_) => ProcessorError::Timeout(self.config.process_timeout),
        };

        warn!(error = %error, "image processing fell back to local generation");
        self.metrics.lock().record_failure();
        self.fallback(started, Some(error.to_string()))
    }

    /// Process several images in one backend call.
    ///
    /// Unlike single images there is no local fallback: the backend must be
    /// reachable.
    pub async fn batch_process(&self, images: &[String]) -> Result<Vec<ProcessingResult>, ProcessorError> {
        let backend = match &self.backend {
            Some(backend) if self.is_connected() => backend,
            Some(_) => return Err(ProcessorError::NotConnected),
            None => return Err(ProcessorError::Disabled),
        };
        let started = Instant::now();
        match timeout(self.config.batch_timeout, backend.batch_process(images)).await {
            Ok(Ok(results)) => {
                self.metrics.lock().record_success(started.elapsed());
                Ok(results)
            }
            Ok(Err(err)) => {
                self.metrics.lock().record_failure();
                Err(err)
            }
            Err(_) => {
                self.metrics.lock().record_failure();
                Err(ProcessorError::Timeout(self.config.batch_timeout))
            }
        }
    }

    /// Insert one detection per reading of `result` and return how many were
    /// stored. Insert failures are logged and skipped.
    pub async fn log_results(
        &self,
        result: &ProcessingResult,
        store: &dyn RemoteStore,
        session: Option<&Session>,
    ) -> usize {
        let mut logged = 0;
        for reading in &result.results {
            let draft = self.draft_for(reading, session);
            match store.insert(NewRow::Detection(draft)).await {
                Ok(row) => {
                    debug!(id = %row.id(), plate = %reading.plate_number, "processed plate logged");
                    logged += 1;
                }
                Err(err) => warn!(plate = %reading.plate_number, error = %err, "logging processed plate failed"),
            }
        }
        logged
    }

    fn draft_for(&self, reading: &PlateReading, session: Option<&Session>) -> DetectionDraft {
        let confidence = Confidence::saturating(reading.confidence);
        let status = if reading.is_valid && reading.confidence > 90.0 {
            DetectionStatus::Cleared
        } else {
            DetectionStatus::Processing
        };
        DetectionDraft {
            plate_number: plate::validate(&reading.plate_number)
                .unwrap_or_else(|| reading.plate_number.clone()),
            camera_id: self.config.upload_camera_id.clone(),
            confidence,
            location: self.config.upload_location.clone(),
            status,
            user_id: session.map(|s| s.user_id.clone()),
            image_url: None,
        }
    }

    fn fallback(&self, started: Instant, error: Option<String>) -> ProcessingResult {
        let mut rng = self.rng.lock();
        let count = rng.random_range(1..=3usize);
        let results: Vec<PlateReading> = (0..count)
            .map(|_| {
                let plate_number = self.generator.plate(&self.config.upload_camera_id, &mut *rng);
                let confidence = (rng.random_range(75.0..100.0f64) * 10.0).round() / 10.0;
                PlateReading {
                    is_valid: confidence > FALLBACK_VALID_CONFIDENCE && plate::is_valid(&plate_number),
                    raw_text: Some(plate::normalize(&plate_number)),
                    plate_number,
                    confidence,
                    bbox: None,
                }
            })
            .collect();

        ProcessingResult {
            success: true,
            plates_detected: results.len(),
            results,
            processing_time: Some(started.elapsed().as_secs_f64()),
            error,
            source: ResultSource::LocalFallback,
        }
    }
}
