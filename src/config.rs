//! Configuration management.

use serde::Deserialize;
use std::time::Duration;

/// Main ledger configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Redis configuration (queue + pub/sub transports)
    #[serde(default)]
    pub redis: RedisConfig,

    /// Event notification configuration
    #[serde(default)]
    pub notifications: NotificationsConfig,

    /// Agent message streaming configuration
    #[serde(default)]
    pub messages: MessagesConfig,

    /// Timeout recovery sweep configuration
    #[serde(default)]
    pub recovery: RecoveryConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub url: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
        }
    }
}

/// Where appended domain events are forwarded.
///
/// At most one of `webhook_url` / `queue` may be set; the store builder
/// rejects a configuration with both at construction time.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationsConfig {
    /// Webhook endpoint receiving a POST per appended event (fire-and-forget)
    pub webhook_url: Option<String>,

    /// Durable queue name receiving one message per appended event
    pub queue: Option<String>,

    /// Outbound HTTP timeout for webhook delivery
    #[serde(default = "default_webhook_timeout", with = "humantime_serde")]
    pub webhook_timeout: Duration,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            queue: None,
            webhook_timeout: default_webhook_timeout(),
        }
    }
}

/// Where appended agent messages are forwarded.
///
/// At most one of `webhook_url` / `streaming` may be enabled.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessagesConfig {
    /// Webhook endpoint receiving a POST per appended message
    pub webhook_url: Option<String>,

    /// Publish each message on the per-process pub/sub channel
    #[serde(default)]
    pub streaming: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecoveryConfig {
    /// How long a non-terminal process may sit idle after its latest
    /// start-like event before the sweep force-closes it
    #[serde(default = "default_stale_after", with = "humantime_serde")]
    pub stale_after: Duration,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            stale_after: default_stale_after(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level filter (tracing env-filter syntax)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logging: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: false,
        }
    }
}

// Default value functions
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 5 }
fn default_redis_url() -> String { "redis://localhost:6379".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_webhook_timeout() -> Duration { Duration::from_secs(10) }
fn default_stale_after() -> Duration { Duration::from_secs(2 * 60 * 60) }

impl Config {
    /// Load configuration from the environment, honoring a local `.env` file.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("CHRONICLE").separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }

    /// Load from a specific file path, with environment overrides.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("CHRONICLE").separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }
}
