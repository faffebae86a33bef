#![forbid(unsafe_code)]

mod cache;
mod error;
mod generator;
mod health;
mod performance;
mod processor;
mod risk;
mod scheduler;

pub use cache::{Cache, Store};
pub use error::Error;
pub use generator::{Generator, PlatePattern};
pub use health::Health;
pub use performance::Performance;
pub use processor::Processor;
pub use risk::Risk;
pub use scheduler::Scheduler;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Prefix of environment variables overriding file values, e.g.
/// `ANPR_SCHEDULER__BATCH_SIZE=5`.
pub const ENV_PREFIX: &str = "ANPR_";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub cache: Cache,
    pub scheduler: Scheduler,
    pub generator: Generator,
    pub performance: Performance,
    pub processor: Processor,
    pub health: Health,
    pub risk: Risk,
    pub store: Store,
}

impl Config {
    /// Defaults merged with `ANPR_*` environment overrides.
    pub fn new() -> Result<Self, Error> {
        let config: Self = Self::figment().extract()?;
        config.validate()
    }

    /// Load a TOML file on top of the defaults, then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::InvalidPath(path.to_path_buf()));
        }

        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        config.validate()
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, Error> {
        Ok(toml_edit::ser::to_string_pretty(self)?)
    }

    fn figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    fn validate(mut self) -> Result<Self, Error> {
        if self.cache.detection_limit == 0 {
            return Err(Error::Invalid {
                field: "cache.detection_limit",
                reason: "must be at least 1".into(),
            });
        }
        if self.generator.confidence_floor_min > self.generator.confidence_floor_max
            || self.generator.confidence_floor_max > 100
        {
            return Err(Error::Invalid {
                field: "generator.confidence_floor_*",
                reason: "expected confidence_floor_min <= confidence_floor_max <= 100".into(),
            });
        }
        if !self.risk.bands_are_ordered()
            || self.risk.quiet_hours_start > 23
            || self.risk.quiet_hours_end > 23
        {
            return Err(Error::Invalid {
                field: "risk",
                reason: "expected medium_above < high_above < critical_above and quiet hours in 0..=23".into(),
            });
        }
        self.performance = self.performance.clamp();
        Ok(self)
    }
}
