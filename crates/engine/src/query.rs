//! Query orchestration.
//!
//! One `execute_query` call runs the full lifecycle: resolve the provider,
//! substitute placeholders, check the cache, dispatch through the connector
//! registry with bounded retry, store the result, and return an annotated
//! `QueryResult`. Failures come back as structured `success=false` results
//! rather than aborting the caller.

use crate::cache::{compute_cache_key, CacheEntry, CacheStats, CacheStore};
use crate::catalog::StoredQueryStore;
use crate::template::{merge_overrides, parse_template, resolve_parameters};
use fedstat_common::config::{AppConfig, CacheSettings, RetryPolicy};
use fedstat_common::models::{ParameterMap, ProviderConfig, QueryResult};
use fedstat_common::retry::retry_async;
use fedstat_connectors::{ConnectorRegistry, HealthStatus};
use fedstat_error::{ErrorCode, ErrorContext, FedstatError, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Per-call execution options.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Override the configured cache toggle for this call.
    pub use_cache: Option<bool>,
    /// Cooperative deadline covering the connector call and retry sleeps.
    /// Does not roll back cache writes from earlier successful attempts.
    pub deadline: Option<Duration>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct EngineStats {
    pub cache: CacheStats,
    pub providers: usize,
    pub active_providers: usize,
}

pub struct QueryEngine {
    providers: HashMap<String, ProviderConfig>,
    registry: Arc<ConnectorRegistry>,
    cache: Arc<dyn CacheStore>,
    queries: Arc<dyn StoredQueryStore>,
    cache_settings: CacheSettings,
    retry: RetryPolicy,
}

impl QueryEngine {
    pub fn new(
        config: &AppConfig,
        providers: Vec<ProviderConfig>,
        registry: Arc<ConnectorRegistry>,
        cache: Arc<dyn CacheStore>,
        queries: Arc<dyn StoredQueryStore>,
    ) -> Self {
        Self {
            providers: providers
                .into_iter()
                .map(|p| (p.provider_id.clone(), p))
                .collect(),
            registry,
            cache,
            queries,
            cache_settings: config.cache.clone(),
            retry: config.retry.clone(),
        }
    }

    /// All configured providers, sorted by id.
    pub fn providers(&self) -> Vec<&ProviderConfig> {
        let mut providers: Vec<_> = self.providers.values().collect();
        providers.sort_by(|a, b| a.provider_id.cmp(&b.provider_id));
        providers
    }

    pub fn stored_queries(&self) -> &Arc<dyn StoredQueryStore> {
        &self.queries
    }

    fn provider(&self, provider_id: &str) -> Result<&ProviderConfig> {
        match self.providers.get(provider_id) {
            Some(provider) if provider.active => Ok(provider),
            Some(_) => Err(FedstatError::new(
                ErrorCode::ProviderInactive,
                format!("Provider '{}' is inactive", provider_id),
            )
            .with_hint("Activate the provider in the catalog before querying it")),
            None => {
                let mut available: Vec<String> = self.providers.keys().cloned().collect();
                available.sort_unstable();
                let options: Vec<&str> = available.iter().map(String::as_str).collect();
                let mut err = FedstatError::new(
                    ErrorCode::ProviderNotFound,
                    format!("Provider '{}' not found", provider_id),
                )
                .with_context(ErrorContext::ProviderNotFound {
                    provider_id: provider_id.to_string(),
                    available_providers: available.clone(),
                });
                if let Some(closest) = fedstat_error::find_closest_match(provider_id, &options) {
                    err = err.with_hint(format!("Did you mean '{}'?", closest));
                }
                Err(err)
            }
        }
    }

    /// Execute a direct query against a provider.
    ///
    /// Parameter values in placeholder syntax behave exactly as in stored
    /// queries: with no dynamic value to resolve against they are dropped
    /// with a warning.
    pub async fn execute_query(
        &self,
        provider_id: &str,
        parameters: &ParameterMap,
        opts: &QueryOptions,
    ) -> QueryResult {
        let template = parse_template(parameters);
        let (resolved, warnings) = resolve_parameters(&template, &ParameterMap::new());
        self.execute_resolved(provider_id, resolved, warnings, None, opts)
            .await
    }

    /// Execute a stored query with per-call overrides.
    ///
    /// Overrides replace template values by key and supply the dynamic
    /// values placeholders resolve by name.
    pub async fn execute_stored_query(
        &self,
        query_id: &str,
        overrides: &ParameterMap,
        opts: &QueryOptions,
    ) -> QueryResult {
        let stored = match self.queries.get(query_id).await {
            Some(query) if query.active => query,
            other => {
                let inactive = other.is_some();
                let err = FedstatError::new(
                    ErrorCode::StoredQueryNotFound,
                    format!("Stored query '{}' not found", query_id),
                )
                .with_context(ErrorContext::StoredQuery {
                    query_id: query_id.to_string(),
                    inactive,
                })
                .with_hint(if inactive {
                    "The stored query exists but is flagged inactive"
                } else {
                    "Use search/list to discover available stored queries"
                });
                let mut result = QueryResult::failed(String::new(), ParameterMap::new(), err);
                result.query_id = Some(query_id.to_string());
                return result;
            }
        };

        let merged = merge_overrides(&stored.parameters, overrides);
        let (resolved, warnings) = resolve_parameters(&merged, overrides);
        let result = self
            .execute_resolved(
                &stored.provider_id,
                resolved,
                warnings,
                Some(stored.query_id.clone()),
                opts,
            )
            .await;
        result.annotate_stored(&stored)
    }

    async fn execute_resolved(
        &self,
        provider_id: &str,
        parameters: ParameterMap,
        warnings: Vec<String>,
        query_id: Option<String>,
        opts: &QueryOptions,
    ) -> QueryResult {
        let provider = match self.provider(provider_id) {
            Ok(provider) => provider,
            Err(e) => return with_warnings(QueryResult::failed(provider_id, parameters, e), warnings),
        };

        let key = match compute_cache_key(provider_id, &parameters) {
            Ok(key) => key,
            Err(e) => return with_warnings(QueryResult::failed(provider_id, parameters, e), warnings),
        };

        let use_cache = opts.use_cache.unwrap_or(self.cache_settings.enabled);
        if use_cache {
            if let Some(entry) = self.cache.get(&key).await {
                debug!(provider_id, key = %key, "Cache hit");
                return with_warnings(
                    QueryResult::from_cache(provider_id, parameters, entry.result),
                    warnings,
                );
            }
        }

        let dispatch = self.dispatch_with_retry(provider, &parameters);
        let outcome = match opts.deadline {
            Some(deadline) => match tokio::time::timeout(deadline, dispatch).await {
                Ok(outcome) => outcome,
                Err(_) => Err(FedstatError::new(
                    ErrorCode::QueryTimeout,
                    format!(
                        "Query to provider '{}' exceeded the {:?} deadline",
                        provider_id, deadline
                    ),
                )),
            },
            None => dispatch.await,
        };

        match outcome {
            Ok(payload) => {
                if use_cache {
                    self.cache
                        .put(CacheEntry::new(
                            key,
                            provider_id.to_string(),
                            parameters.clone(),
                            payload.clone(),
                            query_id,
                            self.cache_settings.ttl_seconds,
                        ))
                        .await;
                }
                with_warnings(
                    QueryResult::from_connector(provider_id, parameters, payload),
                    warnings,
                )
            }
            Err(e) => {
                warn!(provider_id, error = %e, "Query failed");
                with_warnings(QueryResult::failed(provider_id, parameters, e), warnings)
            }
        }
    }

    /// Scoped connector acquisition with bounded retry: each attempt builds
    /// a fresh connector, and disconnect runs even when the query fails.
    async fn dispatch_with_retry(
        &self,
        provider: &ProviderConfig,
        parameters: &ParameterMap,
    ) -> Result<serde_json::Value> {
        let policy = provider.retry.clone().unwrap_or_else(|| self.retry.clone());
        let attempts = policy.max_retries.max(1);
        let provider_id = provider.provider_id.as_str();

        let outcome = retry_async(
            &format!("query provider '{}'", provider_id),
            &policy,
            FedstatError::is_retryable,
            || async {
                let mut connector = self.registry.create(provider)?;
                connector
                    .connect()
                    .await
                    .map_err(|e| e.into_fedstat(provider_id))?;
                let outcome = connector.query(parameters).await;
                connector.disconnect().await;
                outcome.map_err(|e| e.into_fedstat(provider_id))
            },
        )
        .await;

        outcome.map_err(|e| {
            if e.is_retryable() {
                let last_error = e.message.clone();
                e.with_context(ErrorContext::RetryExhausted {
                    provider_id: provider_id.to_string(),
                    attempts,
                    last_error,
                })
            } else {
                e
            }
        })
    }

    /// Out-of-band provider health check; never consulted on the hot path.
    pub async fn validate_provider(&self, provider_id: &str) -> Result<HealthStatus> {
        let provider = self.providers.get(provider_id).ok_or_else(|| {
            FedstatError::new(
                ErrorCode::ProviderNotFound,
                format!("Provider '{}' not found", provider_id),
            )
        })?;
        let mut connector = self.registry.create(provider)?;
        Ok(connector.validate().await)
    }

    pub async fn invalidate_cache(&self, provider_id: &str) -> usize {
        self.cache.invalidate(provider_id).await
    }

    pub async fn stats(&self) -> EngineStats {
        EngineStats {
            cache: self.cache.stats().await,
            providers: self.providers.len(),
            active_providers: self.providers.values().filter(|p| p.active).count(),
        }
    }
}

fn with_warnings(mut result: QueryResult, warnings: Vec<String>) -> QueryResult {
    result.warnings = warnings;
    result
}
