//! Application configuration
//!
//! Settings layer in fixed precedence: built-in defaults, then a TOML file,
//! then environment variables, then CLI overrides applied by the binary.

use crate::config::roles::RoleSlotSet;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub amqp: AmqpSettings,
    pub matchmaking: MatchmakingSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for the monitoring endpoints
    pub health_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// AMQP settings for outbound event publishing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AmqpSettings {
    /// Publish events to a broker; when false, events are only logged
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub vhost: String,
    /// Connection timeout in seconds
    pub connection_timeout_seconds: u64,
    /// Reconnect/publish attempts beyond the first
    pub max_retry_attempts: u32,
    /// Initial retry backoff in milliseconds
    pub retry_delay_ms: u64,
}

/// Matchmaking-specific settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakingSettings {
    /// How long an incomplete queue stays alive, in seconds
    pub expiry_seconds: u64,
    /// Delay before a completed queue is auto-deleted, in seconds.
    /// Zero disables post-completion cleanup.
    pub post_completion_grace_seconds: u64,
    /// Party composition: required roles and per-role capacity
    pub roles: RoleSlotSet,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "party-finder".to_string(),
            log_level: "info".to_string(),
            health_port: 8080,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for AmqpSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "localhost".to_string(),
            port: 5672,
            username: "guest".to_string(),
            password: "guest".to_string(),
            vhost: "/".to_string(),
            connection_timeout_seconds: 30,
            max_retry_attempts: 5,
            retry_delay_ms: 1000,
        }
    }
}

impl Default for MatchmakingSettings {
    fn default() -> Self {
        Self {
            expiry_seconds: 3600,
            post_completion_grace_seconds: 0,
            roles: RoleSlotSet::default(),
        }
    }
}

/// Read an environment variable and parse it, naming the variable on failure
fn env_override<T: FromStr>(key: &str) -> Result<Option<T>> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("Invalid {} value: {}", key, raw)),
        Err(_) => Ok(None),
    }
}

impl AppConfig {
    /// Defaults plus environment overrides
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// TOML file plus environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Self = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.apply_env_overrides()?;
        validate_config(&config)?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        let service = &mut self.service;
        if let Ok(name) = env::var("SERVICE_NAME") {
            service.name = name;
        }
        if let Ok(level) = env::var("LOG_LEVEL") {
            service.log_level = level;
        }
        if let Some(port) = env_override("HEALTH_PORT")? {
            service.health_port = port;
        }
        if let Some(timeout) = env_override("SHUTDOWN_TIMEOUT_SECONDS")? {
            service.shutdown_timeout_seconds = timeout;
        }

        let amqp = &mut self.amqp;
        if let Some(enabled) = env_override("AMQP_ENABLED")? {
            amqp.enabled = enabled;
        }
        if let Ok(host) = env::var("AMQP_HOST") {
            amqp.host = host;
        }
        if let Some(port) = env_override("AMQP_PORT")? {
            amqp.port = port;
        }
        if let Ok(username) = env::var("AMQP_USERNAME") {
            amqp.username = username;
        }
        if let Ok(password) = env::var("AMQP_PASSWORD") {
            amqp.password = password;
        }
        if let Ok(vhost) = env::var("AMQP_VHOST") {
            amqp.vhost = vhost;
        }
        if let Some(timeout) = env_override("AMQP_CONNECTION_TIMEOUT_SECONDS")? {
            amqp.connection_timeout_seconds = timeout;
        }
        if let Some(retries) = env_override("AMQP_MAX_RETRY_ATTEMPTS")? {
            amqp.max_retry_attempts = retries;
        }
        if let Some(delay) = env_override("AMQP_RETRY_DELAY_MS")? {
            amqp.retry_delay_ms = delay;
        }

        let matchmaking = &mut self.matchmaking;
        if let Some(expiry) = env_override("QUEUE_EXPIRY_SECONDS")? {
            matchmaking.expiry_seconds = expiry;
        }
        if let Some(grace) = env_override("POST_COMPLETION_GRACE_SECONDS")? {
            matchmaking.post_completion_grace_seconds = grace;
        }
        if let Ok(spec) = env::var("ROLE_SLOTS") {
            matchmaking.roles = RoleSlotSet::parse(&spec)
                .with_context(|| format!("Invalid ROLE_SLOTS value: {}", spec))?;
        }

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get AMQP connection timeout as Duration
    pub fn amqp_connection_timeout(&self) -> Duration {
        Duration::from_secs(self.amqp.connection_timeout_seconds)
    }

    /// Get queue expiry as Duration
    pub fn expiry(&self) -> Duration {
        Duration::from_secs(self.matchmaking.expiry_seconds)
    }

    /// Get post-completion grace as Duration
    pub fn post_completion_grace(&self) -> Duration {
        Duration::from_secs(self.matchmaking.post_completion_grace_seconds)
    }
}

/// Reject configurations the service cannot run with
pub fn validate_config(config: &AppConfig) -> Result<()> {
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        other => return Err(anyhow!("Invalid log level: {}", other)),
    }

    if config.service.health_port == 0 {
        return Err(anyhow!("Health port cannot be 0"));
    }
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    if config.amqp.enabled {
        if config.amqp.host.is_empty() {
            return Err(anyhow!("AMQP host cannot be empty"));
        }
        if config.amqp.port == 0 {
            return Err(anyhow!("AMQP port cannot be 0"));
        }
        if config.amqp.connection_timeout_seconds == 0 {
            return Err(anyhow!("AMQP connection timeout must be greater than 0"));
        }
    }

    if config.matchmaking.expiry_seconds == 0 {
        return Err(anyhow!("Queue expiry must be greater than 0"));
    }
    config.matchmaking.roles.validate()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.matchmaking.expiry_seconds, 3600);
        assert_eq!(config.matchmaking.post_completion_grace_seconds, 0);
        assert_eq!(config.matchmaking.roles.party_size(), 6);
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let mut config = AppConfig::default();
        config.service.log_level = "verbose".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_zero_expiry_rejected() {
        let mut config = AppConfig::default();
        config.matchmaking.expiry_seconds = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_amqp_host_only_checked_when_enabled() {
        let mut config = AppConfig::default();
        config.amqp.host = String::new();
        assert!(validate_config(&config).is_err());

        config.amqp.enabled = false;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [matchmaking]
            expiry_seconds = 120

            [[matchmaking.roles.slots]]
            name = "tank"
            capacity = 1

            [[matchmaking.roles.slots]]
            name = "dps"
            capacity = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.matchmaking.expiry_seconds, 120);
        assert_eq!(config.matchmaking.roles.party_size(), 3);
        assert_eq!(config.service.health_port, 8080);
    }
}
