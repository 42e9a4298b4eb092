//! # Error Contexts
//!
//! Structured metadata for errors to enable programmatic handling by API
//! clients and operational tooling.

use serde::{Deserialize, Serialize};

/// Structured context attached to a [`crate::FedstatError`].
///
/// Each variant provides specific fields relevant to that error type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ErrorContext {
    /// Context for FEDSTAT-1001 (ProviderNotFound)
    ProviderNotFound {
        provider_id: String,
        available_providers: Vec<String>,
    },

    /// Context for connection-level failures (FEDSTAT-1003)
    Connection {
        provider_id: String,
        provider_type: String,
        endpoint: Option<String>,
    },

    /// Context for FEDSTAT-2001 (BadRequest): what the provider said
    Upstream {
        provider_id: String,
        status: Option<u16>,
        body_snippet: Option<String>,
    },

    /// Context for FEDSTAT-2002 (Transient) after retry exhaustion
    RetryExhausted {
        provider_id: String,
        attempts: u32,
        last_error: String,
    },

    /// Context for FEDSTAT-2003 (StoredQueryNotFound)
    StoredQuery { query_id: String, inactive: bool },

    /// Context for FEDSTAT-3001 (MissingJoinKey)
    MissingJoinKey {
        alias: String,
        missing_keys: Vec<String>,
        available_columns: Vec<String>,
    },

    /// Context for FEDSTAT-3002 (UnknownColumn)
    UnknownColumn {
        section: String,
        column: String,
        available_columns: Vec<String>,
    },

    /// Context for FEDSTAT-4001 (config errors)
    Config {
        file_path: Option<String>,
        field: Option<String>,
    },

    /// Generic key-value context for extensibility
    Generic {
        #[serde(flatten)]
        data: std::collections::HashMap<String, serde_json::Value>,
    },
}
