//! Configuration management for the Peoples Room service
//!
//! Environment-based configuration with defaults, file loading, and
//! validation. Environment variables follow the pattern
//! `PEOPLESROOM_<SECTION>_<KEY>`.

use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

mod error;

pub use error::ConfigError;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// Room subsystem configuration
    pub rooms: RoomsConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address
    pub bind_address: SocketAddr,

    /// Graceful shutdown timeout
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,

    /// Close event-channel connections silent beyond this
    #[serde(with = "humantime_serde")]
    pub ws_idle_timeout: Duration,
}

/// Room subsystem configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomsConfig {
    /// Knock TTL from creation
    #[serde(with = "humantime_serde")]
    pub knock_ttl: Duration,

    /// How long terminal knocks stay visible for history
    #[serde(with = "humantime_serde")]
    pub knock_history: Duration,

    /// Maximum knock creations per visitor per window
    pub knock_rate_max: u32,

    /// Rolling rate-limit window
    #[serde(with = "humantime_serde")]
    pub knock_rate_window: Duration,

    /// Per-room event buffer size
    pub event_buffer: usize,

    /// Background expiry sweep interval
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON formatting
    pub json_format: bool,

    /// Include target module
    pub with_target: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            rooms: RoomsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".parse().expect("valid default address"),
            shutdown_timeout: Duration::from_secs(30),
            ws_idle_timeout: Duration::from_secs(60),
        }
    }
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            knock_ttl: Duration::from_secs(30 * 60),
            knock_history: Duration::from_secs(15 * 60),
            knock_rate_max: 3,
            knock_rate_window: Duration::from_secs(3600),
            event_buffer: 256,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            with_target: true,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Example: PEOPLESROOM_SERVER_BIND_ADDRESS=0.0.0.0:8080
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Server config
        if let Ok(addr) = env::var("PEOPLESROOM_SERVER_BIND_ADDRESS") {
            config.server.bind_address = addr
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid bind address: {}", e)))?;
        }
        if let Ok(timeout) = env::var("PEOPLESROOM_SERVER_WS_IDLE_TIMEOUT_SECS") {
            let secs: u64 = timeout.parse().map_err(|e| {
                ConfigError::InvalidValue(format!("Invalid ws idle timeout: {}", e))
            })?;
            config.server.ws_idle_timeout = Duration::from_secs(secs);
        }

        // Rooms config
        if let Ok(ttl) = env::var("PEOPLESROOM_ROOMS_KNOCK_TTL_SECS") {
            let secs: u64 = ttl
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid knock TTL: {}", e)))?;
            config.rooms.knock_ttl = Duration::from_secs(secs);
        }
        if let Ok(max) = env::var("PEOPLESROOM_ROOMS_KNOCK_RATE_MAX") {
            config.rooms.knock_rate_max = max
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid knock rate max: {}", e)))?;
        }
        if let Ok(buffer) = env::var("PEOPLESROOM_ROOMS_EVENT_BUFFER") {
            config.rooms.event_buffer = buffer
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid event buffer: {}", e)))?;
        }

        // Logging config
        if let Ok(level) = env::var("PEOPLESROOM_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(json) = env::var("PEOPLESROOM_LOG_JSON") {
            config.logging.json_format = json
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid JSON flag: {}", e)))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadError(e.to_string()))?;

        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rooms.knock_ttl.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "knock_ttl must be greater than 0".to_string(),
            ));
        }

        if self.rooms.knock_rate_max == 0 {
            return Err(ConfigError::ValidationFailed(
                "knock_rate_max must be greater than 0".to_string(),
            ));
        }

        if self.rooms.event_buffer == 0 {
            return Err(ConfigError::ValidationFailed(
                "event_buffer must be greater than 0".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationFailed(format!(
                "Invalid log level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.rooms.knock_ttl, Duration::from_secs(1800));
        assert_eq!(config.rooms.knock_rate_max, 3);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.rooms.knock_rate_max = 0;
        assert!(config.validate().is_err());

        config = Config::default();
        config.rooms.event_buffer = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_level_validation() {
        let mut config = Config::default();

        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());

        config.logging.level = "debug".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = Config::default();
        let text = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.rooms.knock_ttl, config.rooms.knock_ttl);
    }
}
