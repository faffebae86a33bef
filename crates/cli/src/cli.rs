#![forbid(unsafe_code)]

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use std::path::{Path, PathBuf};

/// anpr-sync: live data layer of the ANPR dashboard
///
/// Mirrors the detection, camera and system-stats tables in memory, follows
/// their change feeds and keeps the feed busy with synthetic detections
/// while live mode is on.
///
/// SIGUSR1 toggles live mode, SIGUSR2 logs every metrics view.
#[derive(Debug, Parser, Clone)]
#[command(about, long_about, version)]
pub struct Cli {
    /// Path to configuration file.
    ///
    /// Defaults plus `ANPR_*` environment overrides are used when unset.
    #[arg(short, long, value_parser = validate_file)]
    pub conffile: Option<PathBuf>,

    /// SQLite database backing the store.
    ///
    /// Overrides `store.database`. Data lives in memory when neither is set.
    #[arg(short, long)]
    pub database: Option<PathBuf>,

    /// Seed for the simulation random source.
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Start with live mode off.
    #[arg(long)]
    pub paused: bool,

    /// Print the effective configuration as TOML and exit.
    #[arg(long)]
    pub dump_config: bool,

    #[command(flatten)]
    pub verbosity: Verbosity<InfoLevel>,
}

impl Cli {
    /// Fold command-line overrides into `config`.
    pub fn apply(&self, config: &mut config::Config) {
        if let Some(database) = &self.database {
            config.store.database = Some(database.clone());
        }
        if self.seed.is_some() {
            config.scheduler.seed = self.seed;
        }
        if self.paused {
            config.scheduler.live_mode = false;
        }
    }
}

/// Check if the file exists.
#[inline(always)]
fn validate_file(file: &str) -> Result<PathBuf, String> {
    let path = Path::new(file);
    if path.exists() {
        Ok(path.to_owned())
    } else {
        Err(format!("File not found: {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn overrides_reach_the_config() {
        let cli = Cli::parse_from(["anpr-sync", "--database", "/tmp/anpr.db", "--seed", "9", "--paused"]);
        let mut config = config::Config::default();
        cli.apply(&mut config);
        assert_eq!(config.store.database, Some(PathBuf::from("/tmp/anpr.db")));
        assert_eq!(config.scheduler.seed, Some(9));
        assert!(!config.scheduler.live_mode);
    }

    #[test]
    fn missing_conffile_is_rejected() {
        let err = Cli::try_parse_from(["anpr-sync", "--conffile", "/definitely/not/here.toml"]);
        assert!(err.is_err());
    }
}
