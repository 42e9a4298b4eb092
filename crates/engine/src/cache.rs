//! Content-addressed query result cache.
//!
//! Keys are a SHA-256 digest over the provider id and the canonical JSON of
//! the post-substitution parameter mapping. The parameter map is a BTreeMap,
//! so serialization order is stable and two mappings with the same pairs
//! always produce the same key regardless of how they were assembled.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use fedstat_common::models::ParameterMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

/// Compute the stable cache key for one (provider, parameters) pair.
pub fn compute_cache_key(
    provider_id: &str,
    parameters: &ParameterMap,
) -> fedstat_error::Result<String> {
    let canonical = serde_json::to_string(&serde_json::json!({
        "provider_id": provider_id,
        "parameters": parameters,
    }))?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// One persisted cache entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub query_hash: String,
    pub source_id: String,
    pub parameters: ParameterMap,
    /// The full normalized payload returned by the connector.
    pub result: serde_json::Value,
    /// Originating stored query, when the execution came through one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub hit_count: u64,
}

impl CacheEntry {
    pub fn new(
        query_hash: String,
        source_id: String,
        parameters: ParameterMap,
        result: serde_json::Value,
        query_id: Option<String>,
        ttl_seconds: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            query_hash,
            source_id,
            parameters,
            result,
            query_id,
            created_at: now,
            expires_at: now + Duration::seconds(ttl_seconds as i64),
            hit_count: 0,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Live entries currently held, expired-but-unswept ones excluded.
    pub size: usize,
}

/// Repository interface for the query result cache.
///
/// `expires_at` is authoritative for visibility: an expired entry must never
/// be returned from `get`, though its physical removal may be deferred.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<CacheEntry>;

    /// Last-write-wins: replaces any existing entry for the same key.
    async fn put(&self, entry: CacheEntry);

    /// Drop all entries for one provider. Returns the number removed.
    async fn invalidate(&self, provider_id: &str) -> usize;

    async fn stats(&self) -> CacheStats;
}

/// In-memory cache store.
///
/// Writes to the same key serialize through the write lock; reads proceed
/// concurrently. Expired entries stay in the map until `sweep` runs, but
/// `get` never returns them.
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Physically remove expired entries. Returns the number removed.
    pub async fn sweep(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, "Swept expired cache entries");
        }
        removed
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Option<CacheEntry> {
        let now = Utc::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if !entry.is_expired(now) => {}
                _ => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
            }
        }
        // Re-check under the write lock: the entry may have been replaced
        // or expired between lock acquisitions.
        let mut entries = self.entries.write().await;
        match entries.get_mut(key) {
            Some(entry) if !entry.is_expired(now) => {
                entry.hit_count += 1;
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.clone())
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    async fn put(&self, entry: CacheEntry) {
        let mut entries = self.entries.write().await;
        entries.insert(entry.query_hash.clone(), entry);
    }

    async fn invalidate(&self, provider_id: &str) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.source_id != provider_id);
        before - entries.len()
    }

    async fn stats(&self) -> CacheStats {
        let now = Utc::now();
        let entries = self.entries.read().await;
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: entries.values().filter(|e| !e.is_expired(now)).count(),
        }
    }
}
