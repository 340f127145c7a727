//! Application Settings
//!
//! Layered as built-in defaults, then an optional TOML file, then
//! `SWINGSTATS_*` environment variables (`__` separates nested keys, e.g.
//! `SWINGSTATS_FEATURES__THRESHOLD=-2.5`).

use crate::rate_limit::RateLimitConfig;
use config::{Config, ConfigError, Environment, File};
use feature_engine::FeatureConfig;
use insight::InsightConfig;
use record_builder::BuilderConfig;
use serde::{Deserialize, Serialize};

/// Config file read when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "swing-stats.toml";

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to bind
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".to_string(),
        }
    }
}

/// Log output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Maximum level (`trace`, `debug`, `info`, `warn`, `error`)
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Top-level application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    /// SQLite URL, or `memory` for the in-memory repository
    pub database_url: String,
    /// Maximum request body size for uploads
    pub max_upload_bytes: usize,
    /// Maximum decompressed size of one archive entry
    pub max_entry_bytes: u64,
    /// Default number of records returned by the stats endpoint
    pub query_limit: usize,
    /// Number of records shown on the dashboard
    pub dashboard_limit: usize,
    pub features: FeatureConfig,
    pub records: BuilderConfig,
    pub insight: InsightConfig,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
    /// Install the Prometheus recorder and serve `/metrics`
    pub metrics_enabled: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database_url: "sqlite://swing_stats.db".to_string(),
            max_upload_bytes: 100 * 1024 * 1024,
            max_entry_bytes: ingest::DEFAULT_MAX_ENTRY_BYTES,
            query_limit: 100,
            dashboard_limit: 20,
            features: FeatureConfig::default(),
            records: BuilderConfig::default(),
            insight: InsightConfig::default(),
            rate_limit: RateLimitConfig::default(),
            logging: LoggingConfig::default(),
            metrics_enabled: true,
        }
    }
}

impl AppConfig {
    /// Load configuration; a missing file is an error only when `path` is given
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let defaults = Config::try_from(&AppConfig::default())?;
        let file = path.unwrap_or(DEFAULT_CONFIG_FILE);

        Config::builder()
            .add_source(defaults)
            .add_source(File::with_name(file).required(path.is_some()))
            .add_source(
                Environment::with_prefix("SWINGSTATS")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("features.tracked_columns"),
            )
            .build()?
            .try_deserialize()
    }
}
