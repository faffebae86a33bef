#![forbid(unsafe_code)]

use crate::domain::RowId;
use crate::processor::ProcessorError;
use crate::store::{StoreError, Table};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(#[from] config::Error),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("processing error: {0}")]
    Processor(#[from] ProcessorError),

    #[error("expected a {expected} row, store returned {actual}")]
    TableMismatch { expected: Table, actual: Table },

    #[error("detection {0} is not in the cache")]
    UnknownDetection(RowId),
}
