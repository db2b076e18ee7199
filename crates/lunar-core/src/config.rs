//! Configuration loading and typed config structures for the lunar service.
//!
//! The configuration lives in `lunar-config.yaml` next to the binary's
//! working directory. Every field has a default, so an absent file or an
//! empty document yields a runnable configuration.

use std::path::{Path, PathBuf};

use chrono::NaiveTime;
use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is outside its allowed range.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level service configuration.
///
/// Mirrors the structure of `lunar-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LunarConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerSettings,

    /// Daily refresh settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Event classification settings.
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Query boundary settings.
    #[serde(default)]
    pub query: QueryConfig,

    /// Phase-table dataset locations.
    #[serde(default)]
    pub phases: PhaseTableConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl LunarConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `LUNAR_PORT` overrides `server.port`
    /// - `LUNAR_REFRESH_AT` overrides `scheduler.refresh_at_utc`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value fails validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, then apply env overrides
    /// and validate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value fails validation.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Override selected values with environment variables when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `LUNAR_PORT` is not a port number.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(val) = std::env::var("LUNAR_PORT") {
            self.server.port = val.parse().map_err(|e| ConfigError::Invalid {
                reason: format!("LUNAR_PORT={val}: {e}"),
            })?;
        }
        if let Ok(val) = std::env::var("LUNAR_REFRESH_AT") {
            self.scheduler.refresh_at_utc = val;
        }
        Ok(())
    }

    /// Check value ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scheduler.refresh_time()?;
        if self.scheduler.cache_horizon_days == 0 {
            return Err(ConfigError::Invalid {
                reason: "scheduler.cache_horizon_days must be at least 1".to_owned(),
            });
        }
        if self.scheduler.generation_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: "scheduler.generation_timeout_ms must be at least 1".to_owned(),
            });
        }
        let eps = self.generator.epsilon;
        if !eps.is_finite() || eps <= 0.0 || eps >= 0.25 {
            return Err(ConfigError::Invalid {
                reason: format!("generator.epsilon must be in (0, 0.25), got {eps}"),
            });
        }
        if self.query.default_range_days > self.query.max_range_days {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "query.default_range_days ({}) exceeds query.max_range_days ({})",
                    self.query.default_range_days, self.query.max_range_days
                ),
            });
        }
        Ok(())
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerSettings {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Daily refresh settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SchedulerConfig {
    /// Wall-clock UTC time of the daily refresh, `HH:MM`.
    #[serde(default = "default_refresh_at_utc")]
    pub refresh_at_utc: String,

    /// Number of days each generation run covers.
    #[serde(default = "default_cache_horizon_days")]
    pub cache_horizon_days: u32,

    /// Upper bound on one generation run, in milliseconds.
    #[serde(default = "default_generation_timeout_ms")]
    pub generation_timeout_ms: u64,
}

impl SchedulerConfig {
    /// Parse [`refresh_at_utc`](Self::refresh_at_utc) into a time of day.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the value is not `HH:MM`.
    pub fn refresh_time(&self) -> Result<NaiveTime, ConfigError> {
        NaiveTime::parse_from_str(self.refresh_at_utc.trim(), "%H:%M").map_err(|e| {
            ConfigError::Invalid {
                reason: format!(
                    "scheduler.refresh_at_utc {:?} is not HH:MM: {e}",
                    self.refresh_at_utc
                ),
            }
        })
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            refresh_at_utc: default_refresh_at_utc(),
            cache_horizon_days: default_cache_horizon_days(),
            generation_timeout_ms: default_generation_timeout_ms(),
        }
    }
}

/// Event classification settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeneratorConfig {
    /// Distance from 0.0 or 0.5 under which a day is classified.
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            epsilon: default_epsilon(),
        }
    }
}

/// Query boundary settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QueryConfig {
    /// Range used when the request does not name one.
    #[serde(default = "default_range_days")]
    pub default_range_days: u32,

    /// Upper clamp for the requested range.
    #[serde(default = "default_max_range_days")]
    pub max_range_days: u32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_range_days: default_range_days(),
            max_range_days: default_max_range_days(),
        }
    }
}

/// Phase-table dataset locations. `None` selects the bundled dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PhaseTableConfig {
    /// JSON file mapping ISO dates to phase records.
    #[serde(default)]
    pub table_path: Option<PathBuf>,

    /// JSON file mapping ISO dates to per-location moon times.
    #[serde(default)]
    pub moon_times_path: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default log level (trace, debug, info, warn, error); `RUST_LOG` wins.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    8080
}

fn default_refresh_at_utc() -> String {
    "03:05".to_owned()
}

const fn default_cache_horizon_days() -> u32 {
    60
}

const fn default_generation_timeout_ms() -> u64 {
    5_000
}

const fn default_epsilon() -> f64 {
    0.02
}

const fn default_range_days() -> u32 {
    30
}

const fn default_max_range_days() -> u32 {
    90
}

fn default_log_level() -> String {
    "info".to_owned()
}
