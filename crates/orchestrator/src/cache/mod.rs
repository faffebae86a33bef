#![forbid(unsafe_code)]

mod bounded;
mod entities;
mod subscription;

pub use bounded::RecentList;
pub use entities::{Applied, CacheSnapshot, EntityCaches};
pub use subscription::{CacheReader, LoadFailure, LoadReport, SubscriptionManager};
