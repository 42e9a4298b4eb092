//! Query orchestration and caching engine for fedstat.
//!
//! The building blocks, leaf-first:
//! - **Cache Store**: content-addressed result cache with expiry (`cache`).
//! - **Stored Query Store**: persisted parameter templates (`catalog`).
//! - **Templates**: placeholder substitution and override merging (`template`).
//! - **Query Engine**: single-query lifecycle with retry and caching (`query`).
//! - **Table**: row-oriented model with an explicit absence marker (`table`).
//! - **Join Engine**: multi-source merge and aggregation (`join`).
//! - **Analysis Dispatcher**: declarative analysis plans (`analysis`).
pub mod analysis;
pub mod cache;
pub mod catalog;
pub mod join;
pub mod query;
pub mod table;
pub mod template;

pub use analysis::{AnalysisDispatcher, AnalysisPlan, AnalysisReport};
pub use cache::{CacheStore, MemoryCacheStore};
pub use catalog::{MemoryStoredQueryStore, StoredQueryStore};
pub use join::JoinEngine;
pub use query::{QueryEngine, QueryOptions};
pub use table::{Cell, Table};
