//! Configuration management
//!
//! TOML configuration with environment variable overrides and sensible
//! defaults. The admission bound honors the `MAX_INGEST_CONCURRENCY`
//! environment variable; a missing, unparsable, or non-positive value falls
//! back to the configured default.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApplicationConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Ingestion configuration
    #[serde(default)]
    pub ingestion: IngestionConfig,

    /// Query configuration
    #[serde(default)]
    pub query: QueryConfig,

    /// Monitoring and observability
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Ingestion configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestionConfig {
    /// Maximum simultaneous sketch inserts, process-wide
    #[serde(default = "default_max_concurrent_inserts")]
    pub max_concurrent_inserts: usize,

    /// Optional downstream endpoint samples could be forwarded to.
    /// Named here for deployment parity; unused by the core coordination
    /// logic.
    #[serde(default)]
    pub forward_endpoint: Option<String>,
}

/// Query configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueryConfig {
    /// Maximum sketch-internal element count passed on materialization
    #[serde(default = "default_sketch_item_budget")]
    pub sketch_item_budget: usize,

    /// Precision / error-bound hint passed on materialization
    #[serde(default = "default_precision_hint")]
    pub precision_hint: f64,

    /// Label name that designates the reporting instance in export gauges
    #[serde(default = "default_instance_label")]
    pub instance_label: String,
}

/// Monitoring configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitoringConfig {
    /// Path of the append-only throughput CSV log
    #[serde(default = "default_throughput_log_path")]
    pub throughput_log_path: PathBuf,

    /// Throughput sampling interval in seconds
    #[serde(default = "default_throughput_interval_secs")]
    pub throughput_interval_secs: u64,
}

// Default value functions
fn default_listen_addr() -> String {
    "0.0.0.0:7000".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_max_concurrent_inserts() -> usize {
    3
}
fn default_sketch_item_budget() -> usize {
    100_000
}
fn default_precision_hint() -> f64 {
    10_000.0
}
fn default_instance_label() -> String {
    "instance".to_string()
}
fn default_throughput_log_path() -> PathBuf {
    PathBuf::from("throughput_log.csv")
}
fn default_throughput_interval_secs() -> u64 {
    5
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            ingestion: IngestionConfig::default(),
            query: QueryConfig::default(),
            monitoring: MonitoringConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            log_level: default_log_level(),
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            max_concurrent_inserts: default_max_concurrent_inserts(),
            forward_endpoint: None,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            sketch_item_budget: default_sketch_item_budget(),
            precision_hint: default_precision_hint(),
            instance_label: default_instance_label(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            throughput_log_path: default_throughput_log_path(),
            throughput_interval_secs: default_throughput_interval_secs(),
        }
    }
}

impl ApplicationConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {}", path, e))?;

        toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config file {}: {}", path, e))
    }

    /// Load configuration from a TOML file with environment overrides
    pub fn from_file_with_env(path: &str) -> Result<Self, String> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from environment variables only
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("SKETCHD_LISTEN_ADDR") {
            self.server.listen_addr = addr;
        }
        if let Ok(level) = std::env::var("RUST_LOG") {
            self.server.log_level = level;
        }

        // Missing, unparsable, or non-positive values leave the configured
        // bound untouched.
        if let Ok(raw) = std::env::var("MAX_INGEST_CONCURRENCY") {
            match raw.parse::<i64>() {
                Ok(parsed) if parsed > 0 => {
                    self.ingestion.max_concurrent_inserts = parsed as usize;
                }
                _ => {
                    eprintln!(
                        "[config] Ignoring invalid MAX_INGEST_CONCURRENCY={:?}, keeping {}",
                        raw, self.ingestion.max_concurrent_inserts
                    );
                }
            }
        }

        if let Ok(endpoint) = std::env::var("FORWARD_ENDPOINT") {
            if !endpoint.is_empty() {
                self.ingestion.forward_endpoint = Some(endpoint);
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.server.listen_addr.is_empty() {
            return Err("Listen address cannot be empty".to_string());
        }
        if self.ingestion.max_concurrent_inserts == 0 {
            return Err("max_concurrent_inserts must be > 0".to_string());
        }
        if self.query.sketch_item_budget == 0 {
            return Err("sketch_item_budget must be > 0".to_string());
        }
        if self.query.precision_hint <= 0.0 {
            return Err("precision_hint must be > 0".to_string());
        }
        if self.query.instance_label.is_empty() {
            return Err("instance_label cannot be empty".to_string());
        }
        if self.monitoring.throughput_interval_secs == 0 {
            return Err("throughput_interval_secs must be > 0".to_string());
        }
        Ok(())
    }
}
