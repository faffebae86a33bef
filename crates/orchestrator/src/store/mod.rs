#![forbid(unsafe_code)]

mod client;
mod error;
mod feed;
mod memory;
mod query;
mod sqlite;

pub use client::{NewRow, RemoteStore};
pub use error::StoreError;
pub use feed::{
    ChangeEvent, ChangeFeed, ChangeListener, ChannelId, EventFilter, EventType, SubscriptionHandle,
};
pub use memory::MemoryStore;
pub use query::{Column, Filter, Order, Query, Row, Table};
pub use sqlite::SqliteStore;
