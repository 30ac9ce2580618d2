/// Service configuration.
///
/// Loaded from an optional TOML file (`pegelmon.toml` by default) with
/// environment-variable overrides on top; `.env` files are honored via
/// dotenv. The trigger binaries refuse to start without a database URL
/// and a provider endpoint.

use serde::Deserialize;
use std::fmt;
use std::path::Path;

use crate::ingest::pegelonline::PEGELONLINE_BASE_URL;

pub const DEFAULT_CONFIG_PATH: &str = "pegelmon.toml";

#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    Missing(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "config read error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "config parse error: {}", msg),
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub database_url: String,
    #[serde(default = "default_api_endpoint")]
    pub api_endpoint: String,
    /// ISO 8601 duration for collection runs.
    #[serde(default = "default_period")]
    pub default_period: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_file: Option<String>,
    /// Provider request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_api_endpoint() -> String {
    PEGELONLINE_BASE_URL.to_string()
}

fn default_period() -> String {
    "P3D".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            database_url: String::new(),
            api_endpoint: default_api_endpoint(),
            default_period: default_period(),
            log_level: default_log_level(),
            log_file: None,
            request_timeout_secs: default_timeout_secs(),
        }
    }
}

impl ServiceConfig {
    /// Loads configuration: TOML file if present, then environment
    /// overrides (`DATABASE_URL`, `PEGELONLINE_API`, `PEGELMON_PERIOD`,
    /// `PEGELMON_LOG_LEVEL`, `PEGELMON_LOG_FILE`).
    pub fn load(path: Option<&str>) -> Result<ServiceConfig, ConfigError> {
        dotenv::dotenv().ok();

        let path = path.unwrap_or(DEFAULT_CONFIG_PATH);
        let mut config = if Path::new(path).exists() {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::Io(format!("{}: {}", path, e)))?;
            toml::from_str(&raw).map_err(|e| ConfigError::Parse(format!("{}: {}", path, e)))?
        } else {
            ServiceConfig::default()
        };

        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database_url = url;
        }
        if let Ok(endpoint) = std::env::var("PEGELONLINE_API") {
            config.api_endpoint = endpoint;
        }
        if let Ok(period) = std::env::var("PEGELMON_PERIOD") {
            config.default_period = period;
        }
        if let Ok(level) = std::env::var("PEGELMON_LOG_LEVEL") {
            config.log_level = level;
        }
        if let Ok(file) = std::env::var("PEGELMON_LOG_FILE") {
            config.log_file = Some(file);
        }

        Ok(config)
    }

    /// Validation for the trigger binaries, which need both stores.
    pub fn validate_for_triggers(&self) -> Result<(), ConfigError> {
        if self.database_url.is_empty() {
            return Err(ConfigError::Missing("database_url (or DATABASE_URL)"));
        }
        if self.api_endpoint.is_empty() {
            return Err(ConfigError::Missing("api_endpoint"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
