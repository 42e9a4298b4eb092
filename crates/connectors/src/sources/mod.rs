//! Provider connector abstractions and implementations.
//!
//! fedstat uses a pluggable connector architecture where each provider type
//! implements the `Connector` trait. This module manages the registration and
//! lifecycle of these connectors.
//!
//! # Supported Providers
//!
//! | Provider Type | Implementation | Description |
//! |---------------|----------------|-------------|
//! | `rest`        | `RestConnector` | HTTP JSON APIs (FBI Crime Data, Census, etc.) |
//! | `local_file`  | `LocalFileConnector` | Local CSV and JSON files |
//!
//! # Adding a New Connector
//!
//! 1. Create a struct implementing `Connector`.
//! 2. Create a matching `ConnectorFactory` that builds it from a `ProviderConfig`.
//! 3. Register the factory in `default_registry` in this module.

use async_trait::async_trait;
use chrono::Utc;
use fedstat_common::models::{ParameterMap, ProviderConfig};
use fedstat_error::{ErrorCode, ErrorContext, FedstatError};
use serde::Serialize;
use std::time::Duration;

pub mod file;
pub mod rest;

/// Classification of a connector failure, used to decide retryability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorErrorKind {
    /// Could not reach or authenticate with the upstream source.
    Connection,
    /// The request itself was invalid; retrying cannot help.
    BadRequest,
    /// A transient upstream fault (timeout, rate limit, 5xx).
    Transient,
}

#[derive(Debug, Clone)]
pub struct ConnectorError {
    pub kind: ConnectorErrorKind,
    pub message: String,
    /// HTTP status from the upstream, when one was received.
    pub status: Option<u16>,
    /// Leading bytes of the upstream response body, for diagnostics.
    pub body_snippet: Option<String>,
}

impl ConnectorError {
    fn new(kind: ConnectorErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            body_snippet: None,
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ConnectorErrorKind::Connection, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ConnectorErrorKind::BadRequest, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ConnectorErrorKind::Transient, message)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_body_snippet(mut self, body: impl Into<String>) -> Self {
        let mut body = body.into();
        if body.len() > 256 {
            let mut cut = 256;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        self.body_snippet = Some(body);
        self
    }

    /// Lift into the engine error type, preserving the retryability class.
    pub fn into_fedstat(self, provider_id: &str) -> FedstatError {
        let code = match self.kind {
            ConnectorErrorKind::Connection => ErrorCode::ConnectionFailed,
            ConnectorErrorKind::BadRequest => ErrorCode::BadRequest,
            ConnectorErrorKind::Transient => ErrorCode::Transient,
        };
        FedstatError::new(code, self.message).with_context(ErrorContext::Upstream {
            provider_id: provider_id.to_string(),
            status: self.status,
            body_snippet: self.body_snippet,
        })
    }
}

impl std::fmt::Display for ConnectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (status {})", self.message, status),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ConnectorError {}

/// Outcome of a connector health probe.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// The probe reached the source.
    pub connected: bool,
    /// The source accepted the configured credential.
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl HealthStatus {
    pub fn healthy() -> Self {
        Self {
            connected: true,
            authenticated: true,
            detail: None,
        }
    }

    pub fn unreachable(detail: impl Into<String>) -> Self {
        Self {
            connected: false,
            authenticated: false,
            detail: Some(detail.into()),
        }
    }

    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self {
            connected: true,
            authenticated: false,
            detail: Some(detail.into()),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.connected && self.authenticated
    }
}

/// A live handle to one provider.
///
/// Connectors are created per acquisition, not shared: the engine builds one
/// from the registry, connects, runs the query, and disconnects, even when
/// the query fails. `disconnect` must be idempotent.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&mut self) -> Result<(), ConnectorError>;

    async fn disconnect(&mut self);

    /// Execute a query with fully resolved parameters. The returned payload
    /// is the normalized `{"data": [...], "metadata": {...}}` envelope.
    async fn query(&self, parameters: &ParameterMap) -> Result<serde_json::Value, ConnectorError>;

    /// Probe the provider end to end (connect, trivial query, disconnect).
    async fn validate(&mut self) -> HealthStatus;
}

/// Builds `Connector` instances for one provider type.
pub trait ConnectorFactory: Send + Sync {
    /// Returns the provider type this factory handles (e.g., "rest").
    fn type_name(&self) -> &'static str;

    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn Connector>, FedstatError>;
}

#[derive(Default)]
pub struct ConnectorRegistry {
    factories: std::collections::HashMap<&'static str, Box<dyn ConnectorFactory>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_factory(&mut self, factory: Box<dyn ConnectorFactory>) {
        self.factories.insert(factory.type_name(), factory);
    }

    pub fn supported_types(&self) -> Vec<&'static str> {
        let mut types: Vec<_> = self.factories.keys().copied().collect();
        types.sort_unstable();
        types
    }

    pub fn create(&self, config: &ProviderConfig) -> Result<Box<dyn Connector>, FedstatError> {
        match self.factories.get(config.provider_type.as_str()) {
            Some(factory) => factory.create(config),
            None => {
                let data = std::collections::HashMap::from([
                    (
                        "provider_id".to_string(),
                        serde_json::Value::String(config.provider_id.clone()),
                    ),
                    (
                        "provider_type".to_string(),
                        serde_json::Value::String(config.provider_type.clone()),
                    ),
                ]);
                Err(FedstatError::new(
                    ErrorCode::UnsupportedProviderType,
                    format!("No connector registered for type '{}'", config.provider_type),
                )
                .with_context(ErrorContext::Generic { data })
                .with_hint(format!(
                    "Supported provider types: {}",
                    self.supported_types().join(", ")
                )))
            }
        }
    }
}

/// The registry with all built-in connectors.
pub fn default_registry(http_timeout: Duration) -> ConnectorRegistry {
    let mut registry = ConnectorRegistry::new();
    registry.register_factory(Box::new(rest::RestConnectorFactory { http_timeout }));
    registry.register_factory(Box::new(file::LocalFileConnectorFactory));
    registry
}

/// Wrap raw records in the normalized payload envelope every connector emits.
pub(crate) fn envelope(records: Vec<serde_json::Value>, source: &str) -> serde_json::Value {
    let record_count = records.len();
    serde_json::json!({
        "data": records,
        "metadata": {
            "source": source,
            "record_count": record_count,
            "timestamp": Utc::now().to_rfc3339(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(provider_type: &str) -> ProviderConfig {
        serde_json::from_value(serde_json::json!({
            "provider_id": "test",
            "type": provider_type,
            "base_url": "http://localhost",
        }))
        .unwrap()
    }

    #[test]
    fn test_unknown_type_lists_supported() {
        let registry = default_registry(Duration::from_secs(5));
        let err = match registry.create(&provider("graphql")) {
            Ok(_) => panic!("unknown provider type must not produce a connector"),
            Err(err) => err,
        };
        assert_eq!(err.code, ErrorCode::UnsupportedProviderType);
        assert!(err.hint.as_deref().unwrap().contains("local_file"));
        assert!(err.hint.as_deref().unwrap().contains("rest"));
    }

    #[test]
    fn test_error_kind_maps_to_code() {
        let err = ConnectorError::transient("rate limited")
            .with_status(429)
            .into_fedstat("fbi");
        assert_eq!(err.code, ErrorCode::Transient);
        assert!(err.is_retryable());

        let err = ConnectorError::bad_request("missing endpoint").into_fedstat("fbi");
        assert_eq!(err.code, ErrorCode::BadRequest);
        assert!(!err.is_retryable());
    }
}
