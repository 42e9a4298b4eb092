#![allow(dead_code)]
//! Shared test harness: a scriptable mock connector wired into a full
//! engine with in-memory stores.

use async_trait::async_trait;
use fedstat_common::config::{AppConfig, RetryPolicy};
use fedstat_common::models::{ParameterMap, ProviderConfig, StoredQuery};
use fedstat_connectors::{
    Connector, ConnectorError, ConnectorFactory, ConnectorRegistry, HealthStatus,
};
use fedstat_engine::{CacheStore, MemoryCacheStore, MemoryStoredQueryStore, QueryEngine};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub enum MockBehavior {
    /// Return these records wrapped in the normalized envelope.
    Records(Vec<serde_json::Value>),
    /// Return the dispatched parameters as the single record.
    EchoParams,
    AlwaysTransient,
    /// Fail transiently this many times, then succeed.
    FailThenSucceed(usize),
    /// Sleep before answering, for deadline tests.
    Slow(Duration),
}

pub struct MockFactory {
    behaviors: HashMap<String, MockBehavior>,
    calls: Arc<AtomicUsize>,
    disconnects: Arc<AtomicUsize>,
}

impl ConnectorFactory for MockFactory {
    fn type_name(&self) -> &'static str {
        "mock"
    }

    fn create(&self, config: &ProviderConfig) -> fedstat_error::Result<Box<dyn Connector>> {
        let behavior = self
            .behaviors
            .get(&config.provider_id)
            .cloned()
            .unwrap_or(MockBehavior::Records(Vec::new()));
        Ok(Box::new(MockConnector {
            behavior,
            calls: self.calls.clone(),
            disconnects: self.disconnects.clone(),
        }))
    }
}

pub struct MockConnector {
    behavior: MockBehavior,
    calls: Arc<AtomicUsize>,
    disconnects: Arc<AtomicUsize>,
}

fn wrap(records: Vec<serde_json::Value>) -> serde_json::Value {
    let record_count = records.len();
    json!({
        "data": records,
        "metadata": {"source": "mock", "record_count": record_count}
    })
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&mut self) -> Result<(), ConnectorError> {
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }

    async fn query(&self, parameters: &ParameterMap) -> Result<serde_json::Value, ConnectorError> {
        let attempt = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        match &self.behavior {
            MockBehavior::Records(records) => Ok(wrap(records.clone())),
            MockBehavior::EchoParams => {
                let record = serde_json::to_value(parameters)
                    .map_err(|e| ConnectorError::bad_request(e.to_string()))?;
                Ok(wrap(vec![record]))
            }
            MockBehavior::AlwaysTransient => Err(ConnectorError::transient("upstream 503")),
            MockBehavior::FailThenSucceed(failures) => {
                if attempt <= *failures {
                    Err(ConnectorError::transient("upstream hiccup"))
                } else {
                    Ok(wrap(vec![json!({"attempt": attempt})]))
                }
            }
            MockBehavior::Slow(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(wrap(Vec::new()))
            }
        }
    }

    async fn validate(&mut self) -> HealthStatus {
        HealthStatus::healthy()
    }
}

pub struct Harness {
    pub engine: Arc<QueryEngine>,
    pub calls: Arc<AtomicUsize>,
    pub disconnects: Arc<AtomicUsize>,
    pub cache: Arc<MemoryCacheStore>,
}

impl Harness {
    pub fn connector_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

pub fn provider(id: &str, active: bool) -> ProviderConfig {
    serde_json::from_value(json!({
        "provider_id": id,
        "type": "mock",
        "active": active,
    }))
    .unwrap()
}

pub fn stored_query(
    id: &str,
    provider_id: &str,
    parameters: serde_json::Value,
    active: bool,
) -> StoredQuery {
    serde_json::from_value(json!({
        "query_id": id,
        "query_name": format!("Query {}", id),
        "description": format!("Stored query {}", id),
        "provider_id": provider_id,
        "parameters": parameters,
        "active": active,
    }))
    .unwrap()
}

pub async fn harness(
    behaviors: Vec<(&str, MockBehavior)>,
    providers: Vec<ProviderConfig>,
    queries: Vec<StoredQuery>,
) -> Harness {
    let calls = Arc::new(AtomicUsize::new(0));
    let disconnects = Arc::new(AtomicUsize::new(0));

    let mut registry = ConnectorRegistry::new();
    registry.register_factory(Box::new(MockFactory {
        behaviors: behaviors
            .into_iter()
            .map(|(id, behavior)| (id.to_string(), behavior))
            .collect(),
        calls: calls.clone(),
        disconnects: disconnects.clone(),
    }));

    let cache = Arc::new(MemoryCacheStore::new());
    let store = Arc::new(MemoryStoredQueryStore::from_queries(queries).await);

    let config = AppConfig {
        retry: RetryPolicy {
            max_retries: 3,
            retry_delay_ms: 1,
            backoff_factor: 2.0,
            max_delay_ms: 5,
        },
        ..AppConfig::default()
    };

    let engine = Arc::new(QueryEngine::new(
        &config,
        providers,
        Arc::new(registry),
        cache.clone() as Arc<dyn CacheStore>,
        store,
    ));

    Harness {
        engine,
        calls,
        disconnects,
        cache,
    }
}
