#![forbid(unsafe_code)]

mod generator;
mod performance;
mod scheduler;
mod system_load;

pub use generator::DetectionGenerator;
pub use performance::{EmitOutcome, PerformanceCache, PerformanceEntry};
pub use scheduler::{CameraPhase, LiveMode, SimulationScheduler, TickReport};
pub use system_load::{DetectionTally, SystemLoad, rollup};
