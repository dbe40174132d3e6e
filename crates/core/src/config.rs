//! File level configuration.
//!
//! A configuration file is TOML; every key is optional and falls back to its
//! default:
//!
//! ```toml
//! log_level = "info"
//!
//! [minstrel]
//! update_stats_ms = 100
//! look_around_rate = 10
//! ewma_level = 75
//! sample_columns = 10
//! frame_length = 1200
//! seed = 42
//! ```

use std::{fs, path::Path, str::FromStr};

use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

use crate::error::ConfigError;
use crate::minstrel_ht::MinstrelHtConfig;
use crate::simulation::ChannelConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub minstrel: MinstrelHtConfig,
    /// Link budget used by the simulator.
    pub channel: ChannelConfig,
    /// `trace`, `debug`, `info`, `warn`, `error` or `off`.
    pub log_level: Option<String>,
}

impl Config {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(s)?;
        config.minstrel.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "Loading configuration");
        Self::from_toml_str(&fs::read_to_string(path)?)
    }

    /// The configured log level; unknown names are ignored with a warning.
    pub fn log_level(&self) -> Option<LevelFilter> {
        let level = self.log_level.as_deref()?;
        match LevelFilter::from_str(level) {
            Ok(filter) => Some(filter),
            Err(_) => {
                tracing::warn!(level, "Unknown log level in configuration, ignoring");
                None
            }
        }
    }
}

/// Installs the global subscriber. Only the first call in a process has an
/// effect.
pub fn set_logger(level: Option<LevelFilter>) {
    #[cfg(feature = "trace")]
    {
        use std::sync::atomic::{AtomicBool, Ordering};

        static LOGGER_SET: AtomicBool = AtomicBool::new(false);
        if LOGGER_SET
            .compare_exchange(false, true, Ordering::Release, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        if let Err(err) = crate::tracing::init_tracer(level) {
            eprintln!("failed tracing initialization: {err}");
        }
    }
    #[cfg(not(feature = "trace"))]
    let _ = level;
}
