//! Engine configuration via `simdb.toml`
//!
//! A default `simdb.toml` is written into the data directory on first open.
//! To change settings, edit the file and restart.

use serde::{Deserialize, Serialize};
use simdb_core::{
    ScoreFormula, SimError, SimResult, TableConfig, DEFAULT_LOAD_FACTOR, DEFAULT_MAX_NEIGHBORS,
};
use std::path::Path;
use std::time::Duration;

/// Config file name placed in the data directory.
pub const CONFIG_FILE_NAME: &str = "simdb.toml";

/// Default maintenance period in milliseconds (two minutes).
pub const DEFAULT_CRON_INTERVAL_MS: u64 = 120_000;

/// Engine configuration loaded from `simdb.toml`.
///
/// # Example
///
/// ```toml
/// cron_interval_ms = 120000
/// load_factor = 0.75
/// max_neighbors = 20
/// score_formula = "squared_cosine"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimDbConfig {
    /// Period of the maintenance cycle (compaction + save), in milliseconds.
    /// `0` disables background maintenance.
    #[serde(default = "default_cron_interval_ms")]
    pub cron_interval_ms: u64,
    /// Load factor for every collection's packed buffer.
    #[serde(default = "default_load_factor")]
    pub load_factor: f64,
    /// Neighbor list capacity for every collection.
    #[serde(default = "default_max_neighbors")]
    pub max_neighbors: usize,
    /// Score formula: `"squared_cosine"` (default) or `"cosine"`.
    #[serde(default)]
    pub score_formula: ScoreFormula,
}

fn default_cron_interval_ms() -> u64 {
    DEFAULT_CRON_INTERVAL_MS
}

fn default_load_factor() -> f64 {
    DEFAULT_LOAD_FACTOR
}

fn default_max_neighbors() -> usize {
    DEFAULT_MAX_NEIGHBORS
}

impl Default for SimDbConfig {
    fn default() -> Self {
        Self {
            cron_interval_ms: DEFAULT_CRON_INTERVAL_MS,
            load_factor: DEFAULT_LOAD_FACTOR,
            max_neighbors: DEFAULT_MAX_NEIGHBORS,
            score_formula: ScoreFormula::default(),
        }
    }
}

impl SimDbConfig {
    /// Table configuration shared by every collection.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the load factor or capacity is out of range.
    pub fn table_config(&self) -> SimResult<TableConfig> {
        let config = TableConfig {
            load_factor: self.load_factor,
            max_neighbors: self.max_neighbors,
            score_formula: self.score_formula,
        };
        config.validate()?;
        Ok(config)
    }

    /// Maintenance period, or `None` when background maintenance is off.
    pub fn cron_interval(&self) -> Option<Duration> {
        match self.cron_interval_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# simdb configuration
#
# Maintenance period in milliseconds (default: 120000).
# Every period one random collection is compacted and all collections are
# saved. 0 disables background maintenance.
cron_interval_ms = 120000

# Buffer load factor after compaction, in (0, 1] (default: 0.75)
load_factor = 0.75

# Neighbors kept per document (default: 20)
max_neighbors = 20

# Score formula: "squared_cosine" (default) or "cosine"
score_formula = "squared_cosine"
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, cannot be parsed, or
    /// holds out-of-range table settings.
    pub fn from_file(path: &Path) -> SimResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SimError::configuration(
                CONFIG_FILE_NAME,
                format!("failed to read '{}': {}", path.display(), e),
            )
        })?;
        let config: SimDbConfig = toml::from_str(&content).map_err(|e| {
            SimError::configuration(
                CONFIG_FILE_NAME,
                format!("failed to parse '{}': {}", path.display(), e),
            )
        })?;
        config.table_config()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> SimResult<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml())?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> SimResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| {
            SimError::configuration(CONFIG_FILE_NAME, format!("failed to serialize: {}", e))
        })?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
