use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use courier_pool::PoolConfig;
use courier_smtp::SmtpConfig;
use serde::Deserialize;

use crate::source::MqttConfig;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "COURIER_CONFIG";

/// Locations searched, in order, when [`CONFIG_ENV`] is not set.
const DEFAULT_PATHS: [&str; 2] = ["./courier.config.ron", "/etc/courier/courier.config.ron"];

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub smtp: SmtpConfig,

    #[serde(default)]
    pub pool: PoolConfig,

    pub mqtt: MqttConfig,

    /// How long in-flight messages may take to finish after a shutdown
    /// signal before the pool is closed under them.
    ///
    /// Default: 10 seconds
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

const fn default_shutdown_grace_secs() -> u64 {
    10
}

impl Config {
    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// Reads and parses a RON configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid
    /// configuration.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        ron::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }
}

/// Find the configuration file using the following precedence:
/// 1. `COURIER_CONFIG` environment variable
/// 2. ./courier.config.ron (current working directory)
/// 3. /etc/courier/courier.config.ron (system-wide config)
///
/// # Errors
///
/// Returns an error if the environment variable names a missing file, or if
/// none of the default locations exist.
pub fn find_config_file() -> anyhow::Result<PathBuf> {
    locate(
        std::env::var_os(CONFIG_ENV).map(PathBuf::from),
        &DEFAULT_PATHS.map(PathBuf::from),
    )
}

fn locate(explicit: Option<PathBuf>, defaults: &[PathBuf]) -> anyhow::Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path);
        }
        anyhow::bail!(
            "{CONFIG_ENV} points to non-existent file: {}",
            path.display()
        );
    }

    if let Some(path) = defaults.iter().find(|path| path.exists()) {
        return Ok(path.clone());
    }

    let paths_tried = defaults
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    anyhow::bail!(
        "No configuration file found. Tried:\n  - {CONFIG_ENV} environment variable\n{paths_tried}"
    )
}
