//! Stored query catalog.
//!
//! Mutations (create/update/delete) originate from an external management
//! surface; the engine only reads. The in-memory store exposes `insert` and
//! `remove` outside the repository trait for wiring and tests.

use async_trait::async_trait;
use fedstat_common::models::StoredQuery;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[async_trait]
pub trait StoredQueryStore: Send + Sync {
    async fn get(&self, query_id: &str) -> Option<StoredQuery>;

    /// Case-insensitive substring search over id, name, description, tags.
    async fn search(&self, term: &str) -> Vec<StoredQuery>;

    async fn list(&self, provider_id: Option<&str>, active_only: bool) -> Vec<StoredQuery>;
}

#[derive(Default)]
pub struct MemoryStoredQueryStore {
    queries: RwLock<HashMap<String, StoredQuery>>,
}

impl MemoryStoredQueryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn from_queries(queries: Vec<StoredQuery>) -> Self {
        let store = Self::new();
        for query in queries {
            store.insert(query).await;
        }
        store
    }

    pub async fn insert(&self, query: StoredQuery) {
        let mut queries = self.queries.write().await;
        queries.insert(query.query_id.clone(), query);
    }

    pub async fn remove(&self, query_id: &str) -> Option<StoredQuery> {
        let mut queries = self.queries.write().await;
        queries.remove(query_id)
    }

    pub async fn known_ids(&self) -> Vec<String> {
        let queries = self.queries.read().await;
        let mut ids: Vec<_> = queries.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }
}

#[async_trait]
impl StoredQueryStore for MemoryStoredQueryStore {
    async fn get(&self, query_id: &str) -> Option<StoredQuery> {
        let queries = self.queries.read().await;
        queries.get(query_id).cloned()
    }

    async fn search(&self, term: &str) -> Vec<StoredQuery> {
        let queries = self.queries.read().await;
        let mut found: Vec<_> = queries.values().filter(|q| q.matches(term)).cloned().collect();
        found.sort_by(|a, b| a.query_id.cmp(&b.query_id));
        found
    }

    async fn list(&self, provider_id: Option<&str>, active_only: bool) -> Vec<StoredQuery> {
        let queries = self.queries.read().await;
        let mut found: Vec<_> = queries
            .values()
            .filter(|q| provider_id.is_none_or(|p| q.provider_id == p))
            .filter(|q| !active_only || q.active)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.query_id.cmp(&b.query_id));
        found
    }
}
