#![forbid(unsafe_code)]

use serde::Serialize;
use std::time::Duration;

/// Request counters of the processing backend.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ConnectionMetrics {
    pub successful_requests: u64,
    pub failed_requests: u64,
    /// Duration of the last successful request.
    pub response_time: Duration,
    /// Failed share of all requests, in percent.
    pub error_rate: f64,
}

impl ConnectionMetrics {
    pub fn record_success(&mut self, response_time: Duration) {
        self.successful_requests += 1;
        self.response_time = response_time;
        self.refresh_error_rate();
    }

    pub fn record_failure(&mut self) {
        self.failed_requests += 1;
        self.refresh_error_rate();
    }

    pub fn total_requests(&self) -> u64 {
        self.successful_requests + self.failed_requests
    }

    fn refresh_error_rate(&mut self) {
        let total = self.total_requests();
        self.error_rate = if total == 0 {
            0.0
        } else {
            self.failed_requests as f64 / total as f64 * 100.0
        };
    }
}
