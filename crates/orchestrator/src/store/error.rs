#![forbid(unsafe_code)]

use crate::store::{ChannelId, Table};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("channel `{0}` is already subscribed")]
    DuplicateChannel(ChannelId),

    #[error("no row `{id}` in {table}")]
    NotFound { table: Table, id: String },

    #[error("column `{column}` does not exist on {table}")]
    UnknownColumn { table: Table, column: &'static str },

    #[error("invalid row in {table}: {reason}")]
    InvalidRow { table: Table, reason: String },
}
