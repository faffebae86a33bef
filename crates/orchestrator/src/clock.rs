#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::Instant;

/// Time source of the scheduler and the engine loop.
///
/// `now` is monotonic and follows tokio's paused clock in tests; `wall` is
/// what lands in detection windows and stats rollups.
#[async_trait::async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn wall(&self) -> DateTime<Utc>;
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default)]
pub struct SystemClock;

#[async_trait::async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
