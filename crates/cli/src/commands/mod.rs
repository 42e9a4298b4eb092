//! CLI command implementations, split into logical modules.

mod catalog;
mod helpers;
mod join;
mod query;

pub use catalog::{
    invalidate_cache, list_providers, list_queries, search_queries, stats, validate_provider,
};
pub use helpers::build_context;
pub use join::join;
pub use query::{query, run};
