use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::env;

/// Upstream aggregate-fees source configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct Upstream {
    #[serde(default = "default_fees_url")]
    pub fees_url: String,
    /// How long a successful snapshot is served without touching the network.
    #[serde(default = "default_snapshot_ttl_seconds")]
    pub cache_ttl_seconds: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_fees_url() -> String {
    "https://api.llama.fi/overview/fees".to_string()
}
fn default_snapshot_ttl_seconds() -> u64 {
    300 // 5 minutes
}
fn default_request_timeout_ms() -> u64 {
    15_000
}

impl Default for Upstream {
    fn default() -> Self {
        Self {
            fees_url: default_fees_url(),
            cache_ttl_seconds: default_snapshot_ttl_seconds(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Cache tier connection strings. An absent URL disables that tier for the
/// process lifetime; it is never a startup failure.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Stores {
    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default)]
    pub database_url: Option<String>,
}

/// Inbound API server configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct Api {
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Outer time budget per request; exceeding it fails the whole request.
    #[serde(default = "default_api_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_fees_s_maxage_seconds")]
    pub fees_s_maxage_seconds: u64,
    #[serde(default = "default_fees_swr_seconds")]
    pub fees_stale_while_revalidate_seconds: u64,
    #[serde(default = "default_listing_s_maxage_seconds")]
    pub listing_s_maxage_seconds: u64,
    #[serde(default = "default_listing_swr_seconds")]
    pub listing_stale_while_revalidate_seconds: u64,
}

fn default_api_host() -> String {
    "127.0.0.1".to_string()
}
fn default_api_port() -> u16 {
    8080
}
fn default_api_timeout_ms() -> u64 {
    10_000
}
fn default_fees_s_maxage_seconds() -> u64 {
    900 // 15 minutes
}
fn default_fees_swr_seconds() -> u64 {
    300
}
fn default_listing_s_maxage_seconds() -> u64 {
    3600 // protocols list changes less frequently
}
fn default_listing_swr_seconds() -> u64 {
    1800
}

impl Default for Api {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
            timeout_ms: default_api_timeout_ms(),
            fees_s_maxage_seconds: default_fees_s_maxage_seconds(),
            fees_stale_while_revalidate_seconds: default_fees_swr_seconds(),
            listing_s_maxage_seconds: default_listing_s_maxage_seconds(),
            listing_stale_while_revalidate_seconds: default_listing_swr_seconds(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricsSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub upstream: Upstream,
    #[serde(default)]
    pub stores: Stores,
    #[serde(default)]
    pub api: Api,
    #[serde(default)]
    pub metrics: MetricsSettings,
    #[serde(default)]
    pub log: LogSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Config.toml is optional so env-only deployments work
        let s = Config::builder()
            .add_source(File::with_name("Config.toml").required(false))
            .build()?;

        let mut settings: Self = s.try_deserialize()?;

        // Environment variable overrides for store connections
        if let Ok(redis_url) = env::var("REDIS_URL") {
            if !redis_url.trim().is_empty() {
                settings.stores.redis_url = Some(redis_url);
            }
        }
        if let Ok(database_url) = env::var("DATABASE_URL") {
            if !database_url.trim().is_empty() {
                settings.stores.database_url = Some(database_url);
            }
        }

        if let Ok(fees_url) = env::var("FEES_UPSTREAM_URL") {
            if !fees_url.trim().is_empty() {
                settings.upstream.fees_url = fees_url;
            }
        }

        // Outer request budget in milliseconds
        if let Ok(raw_timeout) = env::var("API_TIMEOUT") {
            if let Ok(timeout_ms) = raw_timeout.trim().parse::<u64>() {
                settings.api.timeout_ms = timeout_ms;
            }
        }

        Ok(settings)
    }
}
