//! Configuration System
//!
//! Runtime configuration for one rank: its place in the group, global exit
//! behaviour, and logging. Loaded with the `config` crate from defaults, an
//! optional TOML file, and `PGAS_*` environment variables, in increasing
//! priority.

use crate::error::ConfigError;
use crate::logging::LoggingConfig;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Rank of this process in the group
    #[serde(default)]
    pub rank: usize,

    /// Number of ranks in the group
    #[serde(default = "default_nranks")]
    pub nranks: usize,

    /// Global exit settings
    #[serde(default)]
    pub global_exit: GlobalExitConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_nranks() -> usize {
    1
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            rank: 0,
            nranks: default_nranks(),
            global_exit: GlobalExitConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Global exit settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalExitConfig {
    /// Ship the triggering rank's exit status to every peer before the
    /// sentinel marker. Off by default: only the marker is sent and peers
    /// exit with their own status.
    #[serde(default)]
    pub propagate_status: bool,

    /// Name of the monitor thread
    #[serde(default = "default_thread_name")]
    pub thread_name: String,
}

fn default_thread_name() -> String {
    "pgas-globalexit".to_string()
}

impl Default for GlobalExitConfig {
    fn default() -> Self {
        Self {
            propagate_status: false,
            thread_name: default_thread_name(),
        }
    }
}

impl RuntimeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nranks == 0 {
            return Err(ConfigError::Invalid("nranks must be at least 1".to_string()));
        }
        if self.rank >= self.nranks {
            return Err(ConfigError::Invalid(format!(
                "rank {} out of range for group of {}",
                self.rank, self.nranks
            )));
        }
        if self.global_exit.thread_name.is_empty() {
            return Err(ConfigError::Invalid(
                "global_exit.thread_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Loads [`RuntimeConfig`] from its sources.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Defaults, then `path` if given, then `PGAS_*` environment variables
    /// (`PGAS_GLOBAL_EXIT__PROPAGATE_STATUS=true` style).
    pub fn load(path: Option<&Path>) -> Result<RuntimeConfig, ConfigError> {
        let mut builder = Config::builder()
            .set_default("rank", 0)?
            .set_default("nranks", 1)?
            .set_default("global_exit.propagate_status", false)?
            .set_default("global_exit.thread_name", default_thread_name())?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("PGAS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: RuntimeConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a single file, ignoring the environment.
    pub fn load_from_file(path: &Path) -> Result<RuntimeConfig, ConfigError> {
        let config: RuntimeConfig = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}
