//! REST API connector.
//!
//! Fetches records from HTTP JSON APIs in the style of US government
//! statistical services (FBI Crime Data Explorer, Census): an opaque
//! credential sent as a query parameter, an `endpoint` parameter appended
//! to the base path, and a JSON body whose record array sits either at the
//! root or behind a known field.
use crate::sources::{envelope, Connector, ConnectorError, ConnectorFactory, HealthStatus};
use async_trait::async_trait;
use fedstat_common::models::{ParameterMap, ProviderConfig};
use fedstat_error::{ErrorCode, ErrorContext, FedstatError};
use secrecy::ExposeSecret;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

fn default_credential_param() -> String {
    "api_key".to_string()
}

/// Provider settings specific to the REST connector, deserialized from the
/// free-form tail of a `ProviderConfig`.
#[derive(Debug, Deserialize, Clone)]
pub struct RestConnectorSettings {
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Query parameter name the credential is sent under.
    #[serde(default = "default_credential_param")]
    pub credential_param: String,
    /// Dot-separated path to the record array inside the response body.
    /// When absent, common envelopes (`results`, `data`) are probed.
    #[serde(default)]
    pub data_path: Option<String>,
    /// Endpoint used by `validate`; defaults to the bare base URL.
    #[serde(default)]
    pub health_endpoint: Option<String>,
}

// Must stay in lockstep with the serde field defaults above.
impl Default for RestConnectorSettings {
    fn default() -> Self {
        Self {
            headers: HashMap::new(),
            credential_param: default_credential_param(),
            data_path: None,
            health_endpoint: None,
        }
    }
}

pub struct RestConnector {
    provider_id: String,
    source_name: String,
    base_url: String,
    credential: Option<String>,
    settings: RestConnectorSettings,
    timeout: Duration,
    client: Option<reqwest::Client>,
}

impl RestConnector {
    fn client(&self) -> Result<&reqwest::Client, ConnectorError> {
        self.client
            .as_ref()
            .ok_or_else(|| ConnectorError::connection("REST connector is not connected"))
    }

    /// Join the `endpoint` parameter onto the base URL.
    fn build_url(&self, endpoint: Option<&str>) -> Result<url::Url, ConnectorError> {
        let raw = match endpoint {
            Some(path) => format!(
                "{}/{}",
                self.base_url.trim_end_matches('/'),
                path.trim_matches('/')
            ),
            None => self.base_url.clone(),
        };
        url::Url::parse(&raw)
            .map_err(|e| ConnectorError::bad_request(format!("Invalid request URL '{}': {}", raw, e)))
    }

    async fn fetch(
        &self,
        url: url::Url,
        query_pairs: &[(String, String)],
    ) -> Result<serde_json::Value, ConnectorError> {
        let mut request = self.client()?.get(url).query(query_pairs);
        for (name, value) in &self.settings.headers {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ConnectorError::transient(format!("Request timed out: {}", e))
            } else if e.is_connect() {
                ConnectorError::connection(format!("Failed to reach provider: {}", e))
            } else {
                ConnectorError::transient(format!("Transport error: {}", e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = response.text().await.unwrap_or_default();

            let err = if status.as_u16() == 408 || status.as_u16() == 429 || status.is_server_error()
            {
                let mut message = format!("Provider returned {}", status);
                if let Some(after) = retry_after {
                    message.push_str(&format!(" (Retry-After: {})", after));
                }
                ConnectorError::transient(message)
            } else {
                ConnectorError::bad_request(format!("Provider rejected request ({})", status))
            };
            return Err(err.with_status(status.as_u16()).with_body_snippet(body));
        }

        response
            .json()
            .await
            .map_err(|e| ConnectorError::transient(format!("Failed to parse JSON response: {}", e)))
    }

    /// Pull the record array out of the response body.
    fn extract_records(&self, body: serde_json::Value) -> Result<Vec<serde_json::Value>, ConnectorError> {
        let target = match &self.settings.data_path {
            Some(path) => {
                let mut cursor = &body;
                for segment in path.split('.') {
                    cursor = cursor.get(segment).ok_or_else(|| {
                        ConnectorError::bad_request(format!(
                            "Response has no field '{}' on data_path '{}'",
                            segment, path
                        ))
                    })?;
                }
                cursor.clone()
            }
            None => match &body {
                serde_json::Value::Object(map) => map
                    .get("results")
                    .or_else(|| map.get("data"))
                    .cloned()
                    .unwrap_or(body),
                _ => body,
            },
        };

        Ok(match target {
            serde_json::Value::Array(records) => records,
            serde_json::Value::Object(_) => vec![target],
            other => vec![serde_json::json!({ "value": other })],
        })
    }
}

fn stringify(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl Connector for RestConnector {
    async fn connect(&mut self) -> Result<(), ConnectorError> {
        if self.client.is_some() {
            return Ok(());
        }
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| ConnectorError::connection(format!("Failed to build HTTP client: {}", e)))?;
        self.client = Some(client);
        tracing::debug!(provider_id = %self.provider_id, "REST connector ready");
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.client = None;
    }

    async fn query(&self, parameters: &ParameterMap) -> Result<serde_json::Value, ConnectorError> {
        let endpoint = parameters.get("endpoint").map(stringify);
        let url = self.build_url(endpoint.as_deref())?;

        let mut query_pairs: Vec<(String, String)> = parameters
            .iter()
            .filter(|(key, _)| key.as_str() != "endpoint")
            .map(|(key, value)| (key.clone(), stringify(value)))
            .collect();
        if let Some(credential) = &self.credential {
            query_pairs.push((self.settings.credential_param.clone(), credential.clone()));
        }

        tracing::debug!(provider_id = %self.provider_id, url = %url, "Dispatching REST query");
        let body = self.fetch(url, &query_pairs).await?;
        let records = self.extract_records(body)?;
        Ok(envelope(records, &self.source_name))
    }

    async fn validate(&mut self) -> HealthStatus {
        if let Err(e) = self.connect().await {
            return HealthStatus::unreachable(e.to_string());
        }
        let endpoint = self.settings.health_endpoint.clone();
        let result = match self.build_url(endpoint.as_deref()) {
            Ok(url) => {
                let credential_pair = self
                    .credential
                    .as_ref()
                    .map(|c| (self.settings.credential_param.clone(), c.clone()));
                let pairs: Vec<_> = credential_pair.into_iter().collect();
                self.fetch(url, &pairs).await.map(|_| ())
            }
            Err(e) => Err(e),
        };
        self.disconnect().await;
        match result {
            Ok(()) => HealthStatus::healthy(),
            // The probe reached the server but the credential was refused.
            Err(e) if matches!(e.status, Some(401) | Some(403)) => {
                HealthStatus::unauthorized(e.to_string())
            }
            Err(e) => HealthStatus::unreachable(e.to_string()),
        }
    }
}

pub struct RestConnectorFactory {
    pub http_timeout: Duration,
}

impl ConnectorFactory for RestConnectorFactory {
    fn type_name(&self) -> &'static str {
        "rest"
    }

    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn Connector>, FedstatError> {
        let base_url = config.base_url.clone().ok_or_else(|| {
            FedstatError::new(
                ErrorCode::InvalidConfig,
                format!("Provider '{}' has no base_url", config.provider_id),
            )
            .with_context(ErrorContext::Config {
                file_path: None,
                field: Some("base_url".to_string()),
            })
        })?;

        let settings: RestConnectorSettings = serde_json::from_value(config.settings.clone())
            .map_err(|e| {
                FedstatError::new(
                    ErrorCode::InvalidConfig,
                    format!("Invalid REST settings for provider '{}': {}", config.provider_id, e),
                )
            })?;

        Ok(Box::new(RestConnector {
            provider_id: config.provider_id.clone(),
            source_name: config
                .provider_name
                .clone()
                .unwrap_or_else(|| config.provider_id.clone()),
            base_url,
            credential: config
                .credential
                .as_ref()
                .map(|c| c.expose_secret().to_string()),
            settings,
            timeout: self.http_timeout,
            client: None,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::ConnectorErrorKind;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_default_settings_match_deserialized_defaults() {
        let constructed = RestConnectorSettings::default();
        let deserialized: RestConnectorSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(constructed.credential_param, "api_key");
        assert_eq!(constructed.credential_param, deserialized.credential_param);
        assert!(constructed.headers.is_empty());
        assert!(constructed.data_path.is_none());
        assert!(constructed.health_endpoint.is_none());
    }

    fn connector(base_url: &str, settings: RestConnectorSettings) -> RestConnector {
        RestConnector {
            provider_id: "fbi_crime".to_string(),
            source_name: "FBI Crime Data Explorer".to_string(),
            base_url: base_url.to_string(),
            credential: Some("test-key".to_string()),
            settings,
            timeout: Duration::from_secs(5),
            client: None,
        }
    }

    #[tokio::test]
    async fn test_query_appends_endpoint_and_credential() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/estimates/national"))
            .and(query_param("api_key", "test-key"))
            .and(query_param("from", "2020"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"year": 2020, "violent_crime": 1203808}]
            })))
            .mount(&server)
            .await;

        let mut conn = connector(&format!("{}/api", server.uri()), Default::default());
        conn.connect().await.unwrap();

        let params: ParameterMap = serde_json::from_value(json!({
            "endpoint": "estimates/national",
            "from": "2020"
        }))
        .unwrap();

        let payload = conn.query(&params).await.unwrap();
        assert_eq!(payload["data"][0]["violent_crime"], json!(1203808));
        assert_eq!(payload["metadata"]["record_count"], json!(1));
        assert_eq!(
            payload["metadata"]["source"],
            json!("FBI Crime Data Explorer")
        );
        conn.disconnect().await;
    }

    #[tokio::test]
    async fn test_data_path_extraction() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": {"rows": [{"state": "CA"}, {"state": "NY"}]}
            })))
            .mount(&server)
            .await;

        let mut conn = connector(
            &server.uri(),
            RestConnectorSettings {
                data_path: Some("response.rows".to_string()),
                ..Default::default()
            },
        );
        conn.connect().await.unwrap();

        let payload = conn.query(&ParameterMap::new()).await.unwrap();
        assert_eq!(payload["metadata"]["record_count"], json!(2));
        assert_eq!(payload["data"][1]["state"], json!("NY"));
    }

    #[tokio::test]
    async fn test_rate_limit_classifies_transient() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("Retry-After", "7")
                    .set_body_string("slow down"),
            )
            .mount(&server)
            .await;

        let mut conn = connector(&server.uri(), Default::default());
        conn.connect().await.unwrap();

        let err = conn.query(&ParameterMap::new()).await.unwrap_err();
        assert_eq!(err.kind, ConnectorErrorKind::Transient);
        assert_eq!(err.status, Some(429));
        assert!(err.message.contains("Retry-After: 7"));
    }

    #[tokio::test]
    async fn test_client_error_classifies_bad_request() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such endpoint"))
            .mount(&server)
            .await;

        let mut conn = connector(&server.uri(), Default::default());
        conn.connect().await.unwrap();

        let err = conn.query(&ParameterMap::new()).await.unwrap_err();
        assert_eq!(err.kind, ConnectorErrorKind::BadRequest);
        assert_eq!(err.body_snippet.as_deref(), Some("no such endpoint"));
    }

    #[tokio::test]
    async fn test_validate_probes_health_endpoint() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let mut conn = connector(
            &server.uri(),
            RestConnectorSettings {
                health_endpoint: Some("status".to_string()),
                ..Default::default()
            },
        );
        let status = conn.validate().await;
        assert!(status.is_healthy());
    }

    #[tokio::test]
    async fn test_validate_reports_rejected_credential() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let mut conn = connector(&server.uri(), Default::default());
        let status = conn.validate().await;
        assert!(status.connected);
        assert!(!status.authenticated);
        assert!(status.detail.unwrap().contains("401"));
    }
}
