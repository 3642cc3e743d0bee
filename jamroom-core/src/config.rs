use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::models::AccountTier;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub auth: AuthConfig,
    pub rooms: RoomsConfig,
    pub connection_limits: ConnectionLimitsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub http_port: u16,
    /// Largest inbound WebSocket frame accepted, in bytes
    pub max_message_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: 8080,
            max_message_size: 64 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

/// Access token verification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret shared with the account service that issues tokens
    pub jwt_secret: String,
    /// Clock skew tolerated when checking `exp`
    pub leeway_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            leeway_seconds: 60,
        }
    }
}

/// Room size granted per subscription tier. 0 means the tier cannot host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomsConfig {
    pub free_quota: u32,
    pub premium_quota: u32,
    pub family_quota: u32,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            free_quota: 0,
            premium_quota: 5,
            family_quota: 10,
        }
    }
}

impl RoomsConfig {
    #[must_use]
    pub const fn quota_for(&self, tier: AccountTier) -> u32 {
        match tier {
            AccountTier::Free => self.free_quota,
            AccountTier::Premium => self.premium_quota,
            AccountTier::Family => self.family_quota,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionLimitsConfig {
    pub max_per_user: usize,
    pub max_total: usize,
    pub idle_timeout_seconds: u64,
    pub max_duration_seconds: u64,
    /// How often the idle reaper scans connections
    pub reap_interval_seconds: u64,
    /// How often each session pings its transport. Must stay below
    /// `idle_timeout_seconds` so live listeners are never reaped.
    pub keepalive_interval_seconds: u64,
}

impl Default for ConnectionLimitsConfig {
    fn default() -> Self {
        Self {
            max_per_user: 5,
            max_total: 10000,
            idle_timeout_seconds: 300,   // 5 minutes
            max_duration_seconds: 86400, // 24 hours
            reap_interval_seconds: 30,
            keepalive_interval_seconds: 30,
        }
    }
}

impl ConnectionLimitsConfig {
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_seconds)
    }

    #[must_use]
    pub const fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_duration_seconds)
    }

    #[must_use]
    pub const fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_seconds)
    }

    #[must_use]
    pub const fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_seconds)
    }
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        // JAMROOM_SERVER__HTTP_PORT, JAMROOM_CONNECTION_LIMITS__MAX_PER_USER, ...
        builder = builder.add_source(
            Environment::with_prefix("JAMROOM")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load from environment variables only (for Docker/K8s)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load from file path
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    /// Get HTTP address
    #[must_use]
    pub fn http_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.http_port)
    }

    /// Check for misconfigurations, collecting every problem found
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.server.http_port == 0 {
            errors.push("server.http_port must be non-zero".to_string());
        }
        if self.server.max_message_size == 0 {
            errors.push("server.max_message_size must be non-zero".to_string());
        }
        if self.auth.jwt_secret.is_empty() {
            errors.push("auth.jwt_secret must be set".to_string());
        }
        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            errors.push(format!(
                "logging.format must be \"json\" or \"pretty\", got \"{}\"",
                self.logging.format
            ));
        }
        let limits = &self.connection_limits;
        if limits.max_per_user == 0 || limits.max_total == 0 {
            errors.push("connection_limits must allow at least one connection".to_string());
        }
        if limits.reap_interval_seconds == 0 {
            errors.push("connection_limits.reap_interval_seconds must be non-zero".to_string());
        }
        if limits.keepalive_interval_seconds == 0
            || limits.keepalive_interval_seconds >= limits.idle_timeout_seconds
        {
            errors.push(
                "connection_limits.keepalive_interval_seconds must be non-zero and below idle_timeout_seconds"
                    .to_string(),
            );
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
