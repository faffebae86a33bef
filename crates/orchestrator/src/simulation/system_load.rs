#![forbid(unsafe_code)]

use crate::domain::{Camera, Detection, SystemStatsDraft};
use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use rand::Rng;
use serde::Serialize;
use std::collections::VecDeque;

/// Simulated resource usage of the installation, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SystemLoad {
    pub cpu: f64,
    pub memory: f64,
    pub network: f64,
    pub processing: f64,
}

impl Default for SystemLoad {
    fn default() -> Self {
        Self {
            cpu: 45.0,
            memory: 62.0,
            network: 23.0,
            processing: 38.0,
        }
    }
}

impl SystemLoad {
    /// Advance every gauge by a bounded random step.
    pub fn step<R: Rng>(&mut self, rng: &mut R) {
        self.cpu = walk(rng, self.cpu, 10.0, 20.0, 95.0);
        self.memory = walk(rng, self.memory, 8.0, 30.0, 90.0);
        self.network = walk(rng, self.network, 15.0, 5.0, 100.0);
        self.processing = walk(rng, self.processing, 12.0, 10.0, 85.0);
    }

    /// Share of the pipeline left idle, `100 - processing / 2`, rounded.
    pub fn processing_efficiency(&self) -> f64 {
        (100.0 - self.processing / 2.0).round()
    }
}

fn walk<R: Rng>(rng: &mut R, value: f64, spread: f64, lo: f64, hi: f64) -> f64 {
    let offset = (rng.random::<f64>() - 0.5) * spread;
    (value + offset).clamp(lo, hi)
}

/// Counts inserted detections per calendar day and trailing hour.
///
/// The detection cache is bounded, so the rollup cannot be derived from it.
#[derive(Debug, Clone, Default)]
pub struct DetectionTally {
    day: Option<NaiveDate>,
    today: u64,
    last_hour: VecDeque<DateTime<Utc>>,
}

impl DetectionTally {
    pub fn record(&mut self, at: DateTime<Utc>) {
        let day = at.date_naive();
        if self.day != Some(day) {
            self.day = Some(day);
            self.today = 0;
        }
        self.today = self.today.saturating_add(1);
        self.last_hour.push_back(at);
        self.expire(at);
    }

    /// `(today, last hour)` as of `now`.
    pub fn counts(&mut self, now: DateTime<Utc>) -> (u64, u64) {
        self.expire(now);
        let today = if self.day == Some(now.date_naive()) {
            self.today
        } else {
            0
        };
        (today, self.last_hour.len() as u64)
    }

    fn expire(&mut self, now: DateTime<Utc>) {
        let cutoff = now - TimeDelta::hours(1);
        while self.last_hour.front().is_some_and(|t| *t < cutoff) {
            self.last_hour.pop_front();
        }
    }
}

/// Build the stats row published on each rollup tick.
pub fn rollup(
    cameras: &[Camera],
    detections: &[Detection],
    load: &SystemLoad,
    tally: &mut DetectionTally,
    now: DateTime<Utc>,
) -> SystemStatsDraft {
    let (detections_today, detections_hour) = tally.counts(now);
    let accuracy_rate = if detections.is_empty() {
        0.0
    } else {
        detections
            .iter()
            .map(|d| f64::from(d.confidence.get()))
            .sum::<f64>()
            / detections.len() as f64
    };

    SystemStatsDraft {
        active_cameras: cameras.iter().filter(|c| c.is_active()).count() as u32,
        total_cameras: cameras.len() as u32,
        detections_today,
        detections_hour,
        accuracy_rate,
        cpu_usage: load.cpu,
        memory_usage: load.memory,
        network_latency: load.network,
    }
}
