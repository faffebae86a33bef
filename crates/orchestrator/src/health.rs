#![forbid(unsafe_code)]

use crate::notice::Notice;
use crate::store::{Query, RemoteStore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    #[default]
    Connecting,
    Connected,
    Disconnected,
}

impl LinkStatus {
    fn from_check(ok: bool) -> Self {
        if ok { Self::Connected } else { Self::Disconnected }
    }
}

/// Connection badges of the layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConnectionHealth {
    pub store: LinkStatus,
    pub backend: LinkStatus,
    /// Consecutive failed store checks.
    pub store_retries: u32,
    pub backend_retries: u32,
    pub last_store_check: Option<DateTime<Utc>>,
    pub last_backend_check: Option<DateTime<Utc>>,
}

impl ConnectionHealth {
    pub fn is_online(&self) -> bool {
        self.store == LinkStatus::Connected
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    Store,
    Backend,
}

/// Publishes [`ConnectionHealth`] on a watch channel.
#[derive(Debug)]
pub struct HealthMonitor {
    tx: watch::Sender<ConnectionHealth>,
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthMonitor {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ConnectionHealth::default());
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionHealth> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> ConnectionHealth {
        self.tx.borrow().clone()
    }

    /// Fold a store check in. Returns a notice when the status changed.
    pub fn record_store(&self, ok: bool, at: DateTime<Utc>) -> Option<Notice> {
        self.record(Link::Store, ok, at)
    }

    pub fn record_backend(&self, ok: bool, at: DateTime<Utc>) -> Option<Notice> {
        self.record(Link::Backend, ok, at)
    }

    fn record(&self, link: Link, ok: bool, at: DateTime<Utc>) -> Option<Notice> {
        let status = LinkStatus::from_check(ok);
        let mut previous = status;
        self.tx.send_modify(|health| {
            let (current, retries, last) = match link {
                Link::Store => (
                    &mut health.store,
                    &mut health.store_retries,
                    &mut health.last_store_check,
                ),
                Link::Backend => (
                    &mut health.backend,
                    &mut health.backend_retries,
                    &mut health.last_backend_check,
                ),
            };
            previous = *current;
            *current = status;
            *retries = if ok { 0 } else { retries.saturating_add(1) };
            *last = Some(at);
        });

        if previous == status {
            debug!(?link, ?status, "connection check");
            return None;
        }
        info!(?link, ?previous, ?status, "connection status changed");
        let notice = match (link, ok) {
            (Link::Store, true) => Notice::info("Connected to the data store"),
            (Link::Store, false) => Notice::warning("Data store unreachable, showing cached data"),
            (Link::Backend, true) => Notice::info("Processing backend connected"),
            (Link::Backend, false) => {
                Notice::warning("Processing backend unavailable, using local simulation")
            }
        };
        Some(notice)
    }
}

/// Cheap read against the store. A timeout counts as a failure.
pub async fn probe_store(store: &dyn RemoteStore, limit: Duration) -> bool {
    match timeout(limit, store.select(&Query::latest_stats())).await {
        Ok(Ok(_)) => true,
        Ok(Err(err)) => {
            debug!(error = %err, "store probe failed");
            false
        }
        Err(_) => {
            debug!(?limit, "store probe timed out");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn notices_only_on_transitions() {
        let monitor = HealthMonitor::new();
        let now = Utc::now();
        assert!(monitor.record_store(true, now).is_some());
        assert!(monitor.record_store(true, now).is_none());

        let notice = monitor.record_store(false, now).unwrap();
        assert_eq!(notice.level, crate::notice::NoticeLevel::Warning);
        monitor.record_store(false, now);
        assert_eq!(monitor.current().store_retries, 2);
        assert!(!monitor.current().is_online());
    }

    #[tokio::test]
    async fn probe_reflects_store_availability() {
        let store = MemoryStore::new();
        assert!(probe_store(&store, Duration::from_secs(1)).await);
        store.set_available(false);
        assert!(!probe_store(&store, Duration::from_secs(1)).await);
    }
}
