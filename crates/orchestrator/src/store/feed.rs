#![forbid(unsafe_code)]

use crate::store::{Row, StoreError, Table};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    Insert,
    Update,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventFilter {
    #[default]
    All,
    Only(EventType),
}

impl EventFilter {
    pub fn accepts(self, event_type: EventType) -> bool {
        match self {
            Self::All => true,
            Self::Only(wanted) => wanted == event_type,
        }
    }
}

/// A push notification about one row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub event_type: EventType,
    pub row: Row,
}

impl ChangeEvent {
    pub fn insert(row: Row) -> Self {
        Self {
            event_type: EventType::Insert,
            row,
        }
    }

    pub fn update(row: Row) -> Self {
        Self {
            event_type: EventType::Update,
            row,
        }
    }
}

pub type ChangeListener = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

static NEXT_CHANNEL: AtomicU64 = AtomicU64::new(1);

/// Name of a push channel. Two live subscriptions never share one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// A process-unique channel name for `table` as seen by `view`.
    pub fn unique(table: Table, view: &str) -> Self {
        let n = NEXT_CHANNEL.fetch_add(1, Ordering::Relaxed);
        Self(format!("{table}_{view}_{n}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    channel: ChannelId,
    table: Table,
    serial: u64,
}

impl SubscriptionHandle {
    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    pub fn table(&self) -> Table {
        self.table
    }
}

struct Registration {
    serial: u64,
    table: Table,
    filter: EventFilter,
    listener: ChangeListener,
}

/// Channel registry shared by the store implementations.
#[derive(Default)]
pub struct ChangeFeed {
    channels: RwLock<HashMap<ChannelId, Registration>>,
    serial: AtomicU64,
}

impl ChangeFeed {
    pub fn register(
        &self,
        channel: ChannelId,
        table: Table,
        filter: EventFilter,
        listener: ChangeListener,
    ) -> Result<SubscriptionHandle, StoreError> {
        let mut channels = self.channels.write();
        if channels.contains_key(&channel) {
            return Err(StoreError::DuplicateChannel(channel));
        }
        let serial = self.serial.fetch_add(1, Ordering::Relaxed);
        channels.insert(
            channel.clone(),
            Registration {
                serial,
                table,
                filter,
                listener,
            },
        );
        debug!(%channel, %table, "channel subscribed");
        Ok(SubscriptionHandle {
            channel,
            table,
            serial,
        })
    }

    /// Remove the registration behind `handle`. Returns false when it was
    /// already gone.
    pub fn remove(&self, handle: &SubscriptionHandle) -> bool {
        let mut channels = self.channels.write();
        match channels.get(&handle.channel) {
            Some(reg) if reg.serial == handle.serial => {
                channels.remove(&handle.channel);
                debug!(channel = %handle.channel, "channel unsubscribed");
                true
            }
            _ => false,
        }
    }

    /// Deliver `event` to every matching channel exactly once.
    pub fn publish(&self, event: &ChangeEvent) {
        let table = event.row.table();
        // Listeners run outside the lock so they may (un)subscribe.
        let listeners: Vec<ChangeListener> = self
            .channels
            .read()
            .values()
            .filter(|reg| reg.table == table && reg.filter.accepts(event.event_type))
            .map(|reg| Arc::clone(&reg.listener))
            .collect();
        trace!(%table, receivers = listeners.len(), "publishing change");
        for listener in listeners {
            listener(event);
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.read().len()
    }
}

impl fmt::Debug for ChangeFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeFeed")
            .field("channels", &self.channel_count())
            .finish()
    }
}
