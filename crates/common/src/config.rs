pub use crate::models::{ProviderConfig, StoredQuery};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use validator::Validate;

// Default constants
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;
pub const DEFAULT_MAX_DELAY_MS: u64 = 60_000;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Retry policy for connector dispatch.
///
/// `max_retries` is the total attempt ceiling: a provider that fails
/// transiently every time is invoked exactly `max_retries` times.
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct RetryPolicy {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            backoff_factor: default_backoff_factor(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}
fn default_retry_delay_ms() -> u64 {
    DEFAULT_RETRY_DELAY_MS
}
fn default_backoff_factor() -> f64 {
    DEFAULT_BACKOFF_FACTOR
}
fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}

/// Result-cache settings. TTL is the system-wide default; the engine may
/// override it per call.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Validate)]
pub struct CacheSettings {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    #[serde(default = "default_cache_ttl_secs")]
    #[validate(range(min = 1))]
    pub ttl_seconds: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            ttl_seconds: default_cache_ttl_secs(),
        }
    }
}

fn default_cache_enabled() -> bool {
    true
}
fn default_cache_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct AppConfig {
    #[serde(default)]
    #[validate(nested)]
    pub cache: CacheSettings,

    /// Engine-wide retry fallback, used when a provider config carries none.
    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache: CacheSettings::default(),
            retry: RetryPolicy::default(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl AppConfig {
    /// Load configuration from an optional file layered under
    /// `FEDSTAT_`-prefixed environment variables
    /// (e.g. `FEDSTAT_CACHE__TTL_SECONDS=600`).
    pub fn from_file(path: &str) -> Result<Self> {
        let builder = config::Config::builder();

        let builder = if std::path::Path::new(path).exists() {
            builder.add_source(config::File::with_name(path))
        } else {
            builder
        };

        let builder = builder.add_source(
            config::Environment::with_prefix("FEDSTAT")
                .separator("__")
                .try_parsing(true),
        );

        let cfg = builder.build().context("Failed to build configuration")?;

        let app_config: AppConfig = cfg
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        app_config
            .validate()
            .map_err(|e| anyhow::anyhow!("Configuration validation failed: {:?}", e))?;

        Ok(app_config)
    }
}

/// Declarative catalog loaded by the CLI: provider definitions plus stored
/// query definitions. Persistent deployments keep these in an external
/// store; the file form mirrors its shape.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CatalogFile {
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub queries: Vec<StoredQuery>,
}

impl CatalogFile {
    pub fn from_yaml_file(path: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file: {}", path))?;
        let catalog: CatalogFile = serde_yaml::from_str(&raw)
            .with_context(|| format!("Invalid catalog YAML: {}", path))?;

        for provider in &catalog.providers {
            provider.validate().map_err(|e| {
                anyhow::anyhow!("Invalid provider '{}': {:?}", provider.provider_id, e)
            })?;
        }

        Ok(catalog)
    }
}
