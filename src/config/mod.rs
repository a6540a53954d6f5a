use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use crate::common::retry::RetryBackoff;
use crate::error::{Error, Result};

// Default configuration values
const DEFAULT_TWITCH_API_BASE_URL: &str = "https://api.twitch.tv/helix";
const DEFAULT_TWITCH_AUTH_BASE_URL: &str = "https://id.twitch.tv";
/// Ten days, the longest lease the hub accepts
const DEFAULT_LEASE_SECONDS: u64 = 864_000;
/// Nine days, so renewals land before the lease runs out
const DEFAULT_RENEWAL_INTERVAL_SECS: u64 = 777_600;
const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 9100;
const DEFAULT_QUEUE_CONCURRENCY: usize = 5;
const DEFAULT_DEAD_SET_CAPACITY: usize = 1000;
/// Queue the registration workers run on
const REGISTRATION_QUEUE: &str = "low_priority";

/// Environment variable naming an optional JSON config file
pub const CONFIG_PATH_ENV: &str = "STREAMHOOK_CONFIG_PATH";

/// Main configuration struct for streamhook
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Twitch credentials and endpoints
    #[serde(default)]
    pub twitch: TwitchConfig,
    /// Public address the platform is reachable at
    #[serde(default)]
    pub app: AppConfig,
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Background job queue configuration
    #[serde(default)]
    pub queue: QueueConfig,
    /// Lease renewal schedule
    #[serde(default)]
    pub renewal: RenewalConfig,
    /// JSON file to seed the user store from
    #[serde(default = "default_users_file")]
    pub users_file: Option<PathBuf>,
}

/// Twitch credentials and endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwitchConfig {
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default = "default_client_secret")]
    pub client_secret: String,
    /// Shared secret Twitch signs stream notifications with
    #[serde(default = "default_webhook_secret")]
    pub webhook_secret: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_auth_base_url")]
    pub auth_base_url: String,
    /// Subscription lease requested from the hub
    #[serde(default = "default_lease_seconds")]
    pub lease_seconds: u64,
}

/// Public address of the platform, used to build callback URLs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_domain")]
    pub domain: String,
    #[serde(default = "default_app_protocol")]
    pub protocol: String,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bearer token guarding the job endpoints; unset leaves them closed
    #[serde(default = "default_api_token")]
    pub api_token: Option<String>,
}

/// Background job queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Queue names and how many jobs each may run at once
    #[serde(default = "default_queues")]
    pub queues: HashMap<String, usize>,
    /// Backoff between retries of a failed job
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff: RetryBackoff,
    /// How many exhausted jobs to keep for inspection
    #[serde(default = "default_dead_set_capacity")]
    pub dead_set_capacity: usize,
}

/// Lease renewal schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenewalConfig {
    #[serde(default = "default_renewal_enabled")]
    pub enabled: bool,
    #[serde(default = "default_renewal_interval")]
    pub interval_secs: u64,
}

// Default functions
fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|val| val.parse().ok())
}

fn default_client_id() -> String {
    env_string("TWITCH_CLIENT_ID").unwrap_or_default()
}

fn default_client_secret() -> String {
    env_string("TWITCH_CLIENT_SECRET").unwrap_or_default()
}

fn default_webhook_secret() -> String {
    env_string("TWITCH_WEBHOOK_SECRET").unwrap_or_default()
}

fn default_api_base_url() -> String {
    env_string("TWITCH_API_BASE_URL").unwrap_or_else(|| DEFAULT_TWITCH_API_BASE_URL.to_string())
}

fn default_auth_base_url() -> String {
    env_string("TWITCH_AUTH_BASE_URL").unwrap_or_else(|| DEFAULT_TWITCH_AUTH_BASE_URL.to_string())
}

fn default_lease_seconds() -> u64 {
    env_parse("TWITCH_WEBHOOK_LEASE_SECONDS").unwrap_or(DEFAULT_LEASE_SECONDS)
}

fn default_app_domain() -> String {
    env_string("APP_DOMAIN").unwrap_or_else(|| "localhost:3000".to_string())
}

fn default_app_protocol() -> String {
    env_string("APP_PROTOCOL").unwrap_or_else(|| "https".to_string())
}

fn default_bind_address() -> String {
    env_string("STREAMHOOK_BIND_ADDRESS").unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string())
}

fn default_port() -> u16 {
    env_parse("STREAMHOOK_PORT").unwrap_or(DEFAULT_PORT)
}

fn default_api_token() -> Option<String> {
    env_string("STREAMHOOK_API_TOKEN")
}

fn default_queues() -> HashMap<String, usize> {
    let mut queues = HashMap::new();
    queues.insert(
        "default".to_string(),
        env_parse("STREAMHOOK_DEFAULT_CONCURRENCY").unwrap_or(DEFAULT_QUEUE_CONCURRENCY),
    );
    queues.insert(
        "low_priority".to_string(),
        env_parse("STREAMHOOK_LOW_PRIORITY_CONCURRENCY").unwrap_or(DEFAULT_QUEUE_CONCURRENCY),
    );
    queues
}

fn default_retry_backoff() -> RetryBackoff {
    let fallback = RetryBackoff::default();
    RetryBackoff {
        base_ms: env_parse("STREAMHOOK_RETRY_BASE_MS").unwrap_or(fallback.base_ms),
        max_ms: env_parse("STREAMHOOK_RETRY_MAX_MS").unwrap_or(fallback.max_ms),
        jitter: fallback.jitter,
    }
}

fn default_dead_set_capacity() -> usize {
    env_parse("STREAMHOOK_DEAD_SET_CAPACITY").unwrap_or(DEFAULT_DEAD_SET_CAPACITY)
}

fn default_renewal_enabled() -> bool {
    env_parse("STREAMHOOK_RENEWAL_ENABLED").unwrap_or(true)
}

fn default_renewal_interval() -> u64 {
    env_parse("STREAMHOOK_RENEWAL_INTERVAL_SECS").unwrap_or(DEFAULT_RENEWAL_INTERVAL_SECS)
}

fn default_users_file() -> Option<PathBuf> {
    env_string("STREAMHOOK_USERS_FILE").map(PathBuf::from)
}

impl Default for TwitchConfig {
    fn default() -> Self {
        Self {
            client_id: default_client_id(),
            client_secret: default_client_secret(),
            webhook_secret: default_webhook_secret(),
            api_base_url: default_api_base_url(),
            auth_base_url: default_auth_base_url(),
            lease_seconds: default_lease_seconds(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            domain: default_app_domain(),
            protocol: default_app_protocol(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            api_token: default_api_token(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            queues: default_queues(),
            retry_backoff: default_retry_backoff(),
            dead_set_capacity: default_dead_set_capacity(),
        }
    }
}

impl Default for RenewalConfig {
    fn default() -> Self {
        Self {
            enabled: default_renewal_enabled(),
            interval_secs: default_renewal_interval(),
        }
    }
}

impl ServerConfig {
    /// Socket address string to bind the HTTP server to
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

impl Config {
    /// Check that everything needed to talk to Twitch is present
    pub fn validate(&self) -> Result<()> {
        if self.twitch.client_id.is_empty() {
            return Err(Error::config_missing("TWITCH_CLIENT_ID"));
        }
        if self.twitch.client_secret.is_empty() {
            return Err(Error::config_missing("TWITCH_CLIENT_SECRET"));
        }
        if self.twitch.webhook_secret.is_empty() {
            return Err(Error::config_missing("TWITCH_WEBHOOK_SECRET"));
        }
        if self.twitch.lease_seconds == 0 || self.twitch.lease_seconds > DEFAULT_LEASE_SECONDS {
            return Err(Error::config_invalid(
                "TWITCH_WEBHOOK_LEASE_SECONDS",
                self.twitch.lease_seconds.to_string(),
                format!("must be between 1 and {}", DEFAULT_LEASE_SECONDS),
            ));
        }
        if !matches!(self.app.protocol.as_str(), "http" | "https") {
            return Err(Error::config_invalid(
                "APP_PROTOCOL",
                self.app.protocol.clone(),
                "must be http or https",
            ));
        }
        if self.renewal.enabled && self.renewal.interval_secs == 0 {
            return Err(Error::config_invalid(
                "STREAMHOOK_RENEWAL_INTERVAL_SECS",
                "0",
                "must be greater than zero",
            ));
        }
        if !self.queue.queues.contains_key(REGISTRATION_QUEUE) {
            return Err(Error::config_invalid(
                "queue.queues",
                format!("{:?}", self.queue.queues.keys().collect::<Vec<_>>()),
                format!("the '{}' queue must be configured", REGISTRATION_QUEUE),
            ));
        }
        if let Some((name, _)) = self.queue.queues.iter().find(|(_, concurrency)| **concurrency == 0) {
            return Err(Error::config_invalid(
                format!("queue.queues.{}", name),
                "0",
                "concurrency must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Load the application configuration
///
/// Reads the JSON file named by `STREAMHOOK_CONFIG_PATH` when set; any key
/// absent from the file falls back to its environment variable.
pub async fn load_config() -> Result<Config> {
    let config = match std::env::var(CONFIG_PATH_ENV) {
        Ok(path) => load_from_file(Path::new(&path)).await?,
        Err(_) => {
            debug!("No config file configured, using environment");
            Config::default()
        }
    };

    config.validate()?;
    Ok(config)
}

/// Load configuration from a JSON file
pub async fn load_from_file(path: &Path) -> Result<Config> {
    let config_str = fs::read_to_string(path).await?;
    let config: Config = serde_json::from_str(&config_str)?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}
