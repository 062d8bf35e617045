use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{BenchtraceError, Result};

/// The base config directory name under ~/.config/
const CONFIG_DIR_NAME: &str = "benchtrace";
const CONFIG_FILE_NAME: &str = "config.toml";

/// User configuration loaded from `~/.config/benchtrace/config.toml`.
///
/// Every field has a default so a partial (or missing) config file works.
/// CLI flags always take precedence over config values.
///
/// ```toml
/// # Directory where run logs are written and searched
/// log_dir = "/home/louis/bench-logs"
///
/// # Default metric selection for `plot` (c = CPU, m = memory, r = reads)
/// metrics = "cmr"
///
/// # Normalize CPU percent by the tag's worker count when plotting
/// pretty = false
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory for run logs. Defaults to the current directory.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Default metric selector for `plot` when `--metrics` is not given.
    #[serde(default = "default_metrics")]
    pub metrics: String,

    /// Default for `--pretty` (worker-count CPU normalization).
    #[serde(default)]
    pub pretty: bool,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_metrics() -> String {
    "cmr".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            metrics: default_metrics(),
            pretty: false,
        }
    }
}

impl Config {
    /// Path of the config file, whether or not it exists.
    pub fn path() -> Result<PathBuf> {
        let base = dirs::config_dir()
            .ok_or_else(|| BenchtraceError::Config("Could not determine config directory".into()))?;
        Ok(base.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load the config file, falling back to defaults when it is absent.
    pub fn load() -> Result<Self> {
        let path = Self::path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| BenchtraceError::Config(e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| BenchtraceError::Config(e.to_string()))
    }

    /// Write the config file, creating the parent directory if needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, self.to_toml()?)?;
        Ok(())
    }
}
