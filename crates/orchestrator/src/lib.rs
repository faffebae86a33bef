#![forbid(unsafe_code)]

pub mod cache;
pub mod clock;
pub mod domain;
pub mod engine;
pub mod error;
pub mod health;
pub mod metrics;
pub mod notice;
pub mod processor;
pub mod simulation;
pub mod store;

pub use cache::{CacheReader, CacheSnapshot, SubscriptionManager};
pub use clock::{Clock, SystemClock};
pub use engine::{ControlEvent, LiveSyncEngine, Services};
pub use error::Error;
pub use notice::{Notice, NoticeLevel};
pub use store::{MemoryStore, RemoteStore, SqliteStore};
