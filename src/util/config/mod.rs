//! coflow configuration
//!
//! One TOML file with a section per concern. Every field has a default, so an
//! empty file (or no file at all) is a valid configuration.
//!
//! # Lookup order
//!
//! ```text
//! 1. Explicit path (CLI `--config`)
//! 2. $COFLOW_CONFIG
//! 3. Default values
//! ```
//!
//! # Example
//!
//! ```toml
//! [runner]
//! flow = "staggered:4"
//! park_timeout_ms = 5
//!
//! [sync]
//! timeout_ms = 2000
//!
//! [pool]
//! size = 4
//! batch = 128
//!
//! [log]
//! level = "debug"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use thiserror::Error;

use crate::runtime::scheduler::{parse_flow, FlowModifier};
use crate::util::logger::LogLevel;

/// Environment variable naming a configuration file.
pub const CONFIG_ENV: &str = "COFLOW_CONFIG";

/// Complete configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CoflowConfig {
    /// Dedicated-thread runner settings
    #[serde(default)]
    pub runner: MultiThreadConfig,
    /// Blocking runner settings
    #[serde(default)]
    pub sync: SyncConfig,
    /// Runner pool settings
    #[serde(default)]
    pub pool: PoolConfig,
    /// Logging settings
    #[serde(default)]
    pub log: LogConfig,
}

/// Settings for a runner that owns a thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MultiThreadConfig {
    /// Flow modifier spelling, see [`parse_flow`].
    #[serde(default = "default_flow")]
    pub flow: String,
    /// Longest park once the idle backoff is exhausted.
    #[serde(default = "default_park_timeout_ms")]
    pub park_timeout_ms: u64,
    /// Stack size for the runner thread; platform default if unset.
    #[serde(default)]
    pub stack_size: Option<usize>,
}

fn default_flow() -> String {
    "standard".to_string()
}

fn default_park_timeout_ms() -> u64 {
    10
}

impl Default for MultiThreadConfig {
    fn default() -> Self {
        Self {
            flow: default_flow(),
            park_timeout_ms: default_park_timeout_ms(),
            stack_size: None,
        }
    }
}

impl MultiThreadConfig {
    #[inline]
    pub fn park_timeout(&self) -> Duration {
        Duration::from_millis(self.park_timeout_ms)
    }

    pub fn flow_modifier(&self) -> Result<Box<dyn FlowModifier>, ConfigError> {
        parse_flow(&self.flow).ok_or_else(|| ConfigError::InvalidFlow(self.flow.clone()))
    }
}

/// Settings for the blocking runner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncConfig {
    /// Default drain timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    5_000
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl SyncConfig {
    #[inline]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Settings for the parallel runner pool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PoolConfig {
    /// Number of runners; available parallelism if unset.
    #[serde(default)]
    pub size: Option<usize>,
    /// Iterations a data-parallel lane runs per step.
    #[serde(default = "default_batch")]
    pub batch: usize,
}

fn default_batch() -> usize {
    64
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: None,
            batch: default_batch(),
        }
    }
}

impl PoolConfig {
    /// Configured size, or the machine's available parallelism.
    pub fn resolved_size(&self) -> usize {
        self.size.unwrap_or_else(|| {
            thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        })
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogConfig {
    /// One of trace, debug, info, warn, error.
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

impl LogConfig {
    pub fn level(&self) -> Result<LogLevel, ConfigError> {
        self.level
            .parse()
            .map_err(|_| ConfigError::InvalidLevel(self.level.clone()))
    }
}

impl CoflowConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: CoflowConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check the fields that are only validated on use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.runner.flow_modifier()?;
        self.log.level()?;
        if self.pool.size == Some(0) {
            return Err(ConfigError::InvalidPoolSize);
        }
        if self.pool.batch == 0 {
            return Err(ConfigError::InvalidBatch);
        }
        Ok(())
    }
}

/// Path from the environment, if set and non-empty.
pub fn env_config_path() -> Option<PathBuf> {
    env::var_os(CONFIG_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Load configuration from `path`.
pub fn load_from(path: &Path) -> Result<CoflowConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    CoflowConfig::from_toml_str(&content)
}

/// Load configuration from `path`, else `$COFLOW_CONFIG`, else defaults.
pub fn load(path: Option<&Path>) -> Result<CoflowConfig, ConfigError> {
    if let Some(path) = path {
        return load_from(path);
    }
    match env_config_path() {
        Some(path) => load_from(&path),
        None => Ok(CoflowConfig::default()),
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("unknown flow modifier '{0}'")]
    InvalidFlow(String),

    #[error("unknown log level '{0}'")]
    InvalidLevel(String),

    #[error("pool size must be at least 1")]
    InvalidPoolSize,

    #[error("data-parallel batch must be at least 1")]
    InvalidBatch,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        let config = CoflowConfig::from_toml_str("").unwrap();
        assert_eq!(config, CoflowConfig::default());
        assert_eq!(config.runner.park_timeout(), Duration::from_millis(10));
        assert_eq!(config.sync.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_sections_override_defaults() {
        let config = CoflowConfig::from_toml_str(
            r#"
            [runner]
            flow = "staggered:4"

            [pool]
            size = 3

            [log]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.runner.flow_modifier().unwrap().name(), "staggered");
        assert_eq!(config.runner.park_timeout_ms, 10);
        assert_eq!(config.pool.resolved_size(), 3);
        assert_eq!(config.pool.batch, 64);
        assert_eq!(config.log.level().unwrap(), LogLevel::Debug);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            CoflowConfig::from_toml_str("[runner]\nflow = \"fastest\""),
            Err(ConfigError::InvalidFlow(_))
        ));
        assert!(matches!(
            CoflowConfig::from_toml_str("[log]\nlevel = \"loud\""),
            Err(ConfigError::InvalidLevel(_))
        ));
        assert!(matches!(
            CoflowConfig::from_toml_str("[pool]\nsize = 0"),
            Err(ConfigError::InvalidPoolSize)
        ));
        assert!(matches!(
            CoflowConfig::from_toml_str("[runner]\npark_timeout_ms = \"soon\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_toml_roundtrip_keeps_values() {
        let mut config = CoflowConfig::default();
        config.runner.flow = "time-sliced:3".to_string();
        config.pool.size = Some(2);
        let text = config.to_toml_string().unwrap();
        assert_eq!(CoflowConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = load_from(Path::new("/nonexistent/coflow.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/coflow.toml"));
    }
}
