//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `homeflow.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::time::Duration;

use serde::Deserialize;

use homeflow_adapter_mqtt::MqttConfig;
use homeflow_app::engine::EngineConfig;

const DEFAULT_UPDATE_INTERVAL_SECS: u64 = 30;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// MQTT broker connection.
    pub mqtt: MqttConfig,
    /// Database settings.
    pub database: DatabaseConfig,
    /// Automation engine tuning.
    pub engine: EngineSection,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
}

/// Automation engine settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Seconds between full reloads from the registry. `0` means the default.
    pub update_interval_secs: u64,
    /// Log every evaluation at debug level.
    pub debug_evaluation: bool,
    pub max_concurrent_evaluations: usize,
    pub queue_capacity: usize,
    /// Seconds to wait for in-flight evaluations on shutdown.
    pub drain_timeout_secs: u64,
    /// Capacity of the channel between the bus subscriber and the engine.
    pub inbound_capacity: usize,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Config {
    /// Load configuration from `homeflow.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("homeflow.toml")?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("HOMEFLOW_MQTT_HOST") {
            self.mqtt.broker_host = val;
        }
        if let Some(port) = var("HOMEFLOW_MQTT_PORT").and_then(|val| val.parse().ok()) {
            self.mqtt.broker_port = port;
        }
        if let Some(val) = var("HOMEFLOW_DATABASE_URL") {
            self.database.url = val;
        }
        if let Some(secs) = var("HOMEFLOW_UPDATE_INTERVAL").and_then(|val| val.parse().ok()) {
            self.engine.update_interval_secs = secs;
        }
        if let Some(val) = var("HOMEFLOW_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.mqtt.broker_host.is_empty() {
            return Err(ConfigError::Validation(
                "mqtt broker host must not be empty".to_string(),
            ));
        }
        if self.mqtt.broker_port == 0 {
            return Err(ConfigError::Validation(
                "mqtt broker port must be non-zero".to_string(),
            ));
        }
        if self.engine.max_concurrent_evaluations == 0 {
            return Err(ConfigError::Validation(
                "max_concurrent_evaluations must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Return the database URL in `sqlx`-compatible format.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database.url
    }

    /// Build the engine configuration from the `[engine]` section.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        let update_interval_secs = match self.engine.update_interval_secs {
            0 => DEFAULT_UPDATE_INTERVAL_SECS,
            secs => secs,
        };
        EngineConfig {
            update_interval: Duration::from_secs(update_interval_secs),
            debug_evaluation: self.engine.debug_evaluation,
            max_concurrent_evaluations: self.engine.max_concurrent_evaluations,
            queue_capacity: self.engine.queue_capacity,
            drain_timeout: Duration::from_secs(self.engine.drain_timeout_secs),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:homeflow.db?mode=rwc".to_string(),
        }
    }
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            update_interval_secs: DEFAULT_UPDATE_INTERVAL_SECS,
            debug_evaluation: false,
            max_concurrent_evaluations: 64,
            queue_capacity: 1024,
            drain_timeout_secs: 30,
            inbound_capacity: 256,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "homeflowd=info,homeflow_app=info,homeflow_adapter_mqtt=info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
