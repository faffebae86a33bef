#![forbid(unsafe_code)]

mod client;
mod connection;
pub mod plate;
mod service;
mod types;

pub use client::{HttpBackend, ProcessingBackend, ProcessorError};
pub use connection::ConnectionMetrics;
pub use service::ProcessingService;
pub use types::{BoundingBox, PlateReading, ProcessingResult, ResultSource};
