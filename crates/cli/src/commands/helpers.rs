//! Shared plumbing for CLI commands: engine construction and
//! key=value argument parsing.

use anyhow::{Context, Result};
use fedstat_common::config::{AppConfig, CatalogFile};
use fedstat_common::models::ParameterMap;
use fedstat_connectors::default_registry;
use fedstat_engine::{JoinEngine, MemoryCacheStore, MemoryStoredQueryStore, QueryEngine};
use std::sync::Arc;
use std::time::Duration;

/// Everything a command needs to talk to the engine.
pub struct CliContext {
    pub engine: Arc<QueryEngine>,
    pub join: JoinEngine,
}

/// Load the application config and catalog, then assemble an engine
/// backed by in-memory cache and stored-query stores.
pub async fn build_context(config_path: &str, catalog_path: &str) -> Result<CliContext> {
    let config = AppConfig::from_file(config_path)?;
    let catalog = CatalogFile::from_yaml_file(catalog_path)?;

    let registry = Arc::new(default_registry(Duration::from_secs(
        config.http_timeout_secs,
    )));
    let cache = Arc::new(MemoryCacheStore::new());
    let queries = Arc::new(MemoryStoredQueryStore::from_queries(catalog.queries).await);

    let engine = Arc::new(QueryEngine::new(
        &config,
        catalog.providers,
        registry,
        cache,
        queries,
    ));
    let join = JoinEngine::new(Arc::clone(&engine));

    Ok(CliContext { engine, join })
}

/// Parse a `key=value` pair into a parameter entry. Values that parse
/// as JSON scalars keep their type; everything else stays a string.
pub fn parse_pair(raw: &str) -> Result<(String, serde_json::Value)> {
    let (key, value) = raw
        .split_once('=')
        .with_context(|| format!("Invalid argument '{}': expected key=value", raw))?;
    if key.is_empty() {
        anyhow::bail!("Invalid argument '{}': empty key", raw);
    }
    let parsed = match serde_json::from_str::<serde_json::Value>(value) {
        Ok(v) if !v.is_array() && !v.is_object() => v,
        _ => serde_json::Value::String(value.to_string()),
    };
    Ok((key.to_string(), parsed))
}

/// Collect repeated `key=value` arguments into a parameter map.
pub fn parse_pairs(raw: &[String]) -> Result<ParameterMap> {
    raw.iter().map(|pair| parse_pair(pair)).collect()
}
