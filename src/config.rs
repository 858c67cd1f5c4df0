//! Execution configuration
//!
//! Loaded from a JSON file. Every field has a default, so `{}` is a valid
//! configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observability::{Event, Logger, Severity};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("AERO_CONFIG_IO: {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("AERO_CONFIG_PARSE: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("AERO_CONFIG_INVALID: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Query execution configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecConfig {
    /// Suppress duplicate records in merges (default: true)
    #[serde(default = "default_dedup")]
    pub dedup: bool,

    /// Yield every N works; 0 disables automatic yields (default: 128)
    #[serde(default = "default_yield_every_works")]
    pub yield_every_works: u64,

    /// Maximum children of one merge (default: 64)
    #[serde(default = "default_max_children")]
    pub max_children: usize,

    /// Minimum log severity (default: "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_dedup() -> bool {
    true
}

fn default_yield_every_works() -> u64 {
    128
}

fn default_max_children() -> usize {
    64
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            dedup: default_dedup(),
            yield_every_works: default_yield_every_works(),
            max_children: default_max_children(),
            log_level: default_log_level(),
        }
    }
}

impl ExecConfig {
    /// Read and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_json_str(&text)?;
        Logger::info(
            Event::ConfigLoaded,
            &[
                ("path", &path.display().to_string()),
                ("dedup", &config.dedup.to_string()),
                ("yield_every_works", &config.yield_every_works.to_string()),
            ],
        );
        Ok(config)
    }

    /// Parse and validate a JSON configuration
    pub fn from_json_str(text: &str) -> ConfigResult<Self> {
        let config: ExecConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_children == 0 {
            return Err(ConfigError::Invalid(
                "max_children must be at least 1".to_string(),
            ));
        }
        self.severity()?;
        Ok(())
    }

    /// Parsed `log_level`
    pub fn severity(&self) -> ConfigResult<Severity> {
        self.log_level
            .parse::<Severity>()
            .map_err(|_| ConfigError::Invalid(format!("unknown log_level '{}'", self.log_level)))
    }
}
