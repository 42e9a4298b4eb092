use chrono::{DateTime, Utc};
use fedstat_error::FedstatError;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use validator::Validate;

// Custom Serde logic for SecretString
fn serialize_secret<S>(secret: &Option<SecretString>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match secret {
        Some(_) => serializer.serialize_str("[REDACTED]"),
        None => serializer.serialize_none(),
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    Ok(s.map(SecretString::from))
}

fn default_true() -> bool {
    true
}

/// Canonical parameter mapping. BTreeMap keeps keys sorted, so two mappings
/// with the same pairs hash identically regardless of insertion order.
pub type ParameterMap = BTreeMap<String, serde_json::Value>;

/// Configuration for one provider instance.
///
/// Created and updated by an external administration surface; the engine
/// treats it as read-only. Connector-specific settings (file paths, header
/// maps, data paths) ride along in the flattened `settings` value.
#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct ProviderConfig {
    #[validate(length(min = 1))]
    pub provider_id: String,

    #[serde(default)]
    pub provider_name: Option<String>,

    /// Selects the connector implementation (e.g., "rest", "local_file").
    #[serde(rename = "type")]
    #[validate(length(min = 1))]
    pub provider_type: String,

    #[serde(default)]
    pub base_url: Option<String>,

    /// Opaque credential, forwarded to the connector untouched.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_secret",
        deserialize_with = "deserialize_secret"
    )]
    pub credential: Option<SecretString>,

    #[serde(default)]
    pub format: Option<String>,

    #[serde(default = "default_true")]
    pub active: bool,

    #[serde(default)]
    pub retry: Option<crate::config::RetryPolicy>,

    #[serde(flatten)]
    pub settings: serde_json::Value,
}

/// A parameter template value, parsed once at template-load time.
///
/// `{name}`, `{name hint}`, and `{name opt1|opt2}` are placeholders whose
/// first whitespace-delimited token is the substitution key; everything
/// after it is documentation only. Any other value is a literal.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateValue {
    Literal(serde_json::Value),
    Placeholder { name: String, hint: Option<String> },
}

impl TemplateValue {
    pub fn parse(value: &serde_json::Value) -> Self {
        if let serde_json::Value::String(s) = value {
            let trimmed = s.trim();
            if trimmed.len() >= 2 && trimmed.starts_with('{') && trimmed.ends_with('}') {
                let inner = &trimmed[1..trimmed.len() - 1];
                let mut parts = inner.splitn(2, char::is_whitespace);
                let name = parts.next().unwrap_or("").trim();
                if !name.is_empty() {
                    let hint = parts
                        .next()
                        .map(|h| h.trim().to_string())
                        .filter(|h| !h.is_empty());
                    return TemplateValue::Placeholder {
                        name: name.to_string(),
                        hint,
                    };
                }
            }
        }
        TemplateValue::Literal(value.clone())
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, TemplateValue::Placeholder { .. })
    }
}

impl Serialize for TemplateValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            TemplateValue::Literal(v) => v.serialize(serializer),
            TemplateValue::Placeholder { name, hint } => {
                let rendered = match hint {
                    Some(h) => format!("{{{} {}}}", name, h),
                    None => format!("{{{}}}", name),
                };
                serializer.serialize_str(&rendered)
            }
        }
    }
}

impl<'de> Deserialize<'de> for TemplateValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(TemplateValue::parse(&value))
    }
}

/// A named, persisted parameter template bound to a provider.
///
/// Mutations originate from an external management surface; the engine only
/// reads these at resolution time.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoredQuery {
    pub query_id: String,
    pub query_name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub provider_id: String,
    /// Template values, parsed once at load rather than per call.
    #[serde(default)]
    pub parameters: BTreeMap<String, TemplateValue>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl StoredQuery {
    /// Case-insensitive match over id, name, description, and tags.
    pub fn matches(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        self.query_id.to_lowercase().contains(&term)
            || self.query_name.to_lowercase().contains(&term)
            || self
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&term))
            || self.tags.iter().any(|t| t.to_lowercase().contains(&term))
    }
}

/// Where an execution's payload came from.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResultSource {
    Connector,
    Cache,
}

/// Outcome of a single query execution.
///
/// Invariant: `success == false` implies `payload` is absent and `error`
/// is present; the reverse holds on success.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct QueryResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ResultSource>,
    pub provider_id: String,
    /// Post-substitution parameters actually dispatched (or attempted).
    pub parameters: ParameterMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FedstatError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_description: Option<String>,
    /// Non-fatal diagnostics (dropped placeholders, cache write failures).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl QueryResult {
    pub fn from_connector(
        provider_id: impl Into<String>,
        parameters: ParameterMap,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            success: true,
            source: Some(ResultSource::Connector),
            provider_id: provider_id.into(),
            parameters,
            payload: Some(payload),
            error: None,
            query_id: None,
            query_name: None,
            query_description: None,
            warnings: Vec::new(),
        }
    }

    pub fn from_cache(
        provider_id: impl Into<String>,
        parameters: ParameterMap,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            source: Some(ResultSource::Cache),
            ..Self::from_connector(provider_id, parameters, payload)
        }
    }

    pub fn failed(
        provider_id: impl Into<String>,
        parameters: ParameterMap,
        error: FedstatError,
    ) -> Self {
        Self {
            success: false,
            source: None,
            provider_id: provider_id.into(),
            parameters,
            payload: None,
            error: Some(error),
            query_id: None,
            query_name: None,
            query_description: None,
            warnings: Vec::new(),
        }
    }

    /// Attach stored-query metadata to an execution outcome.
    pub fn annotate_stored(mut self, query: &StoredQuery) -> Self {
        self.query_id = Some(query.query_id.clone());
        self.query_name = Some(query.query_name.clone());
        self.query_description = query.description.clone();
        self
    }
}

/// Join strategy across participating tables.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum JoinMode {
    #[default]
    Inner,
    Left,
    Outer,
}

/// What a join descriptor executes: a direct provider query or a stored
/// query with overrides.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum QueryTarget {
    Stored {
        query_id: String,
        #[serde(default)]
        overrides: ParameterMap,
    },
    Provider {
        provider_id: String,
        #[serde(default)]
        parameters: ParameterMap,
    },
}

/// One participant in a multi-source join.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct QueryDescriptor {
    #[serde(flatten)]
    pub target: QueryTarget,
    /// Label used to suffix colliding non-key columns; defaults to the
    /// provider or query id.
    #[serde(default)]
    pub alias: Option<String>,
    /// Column renames applied before join-key resolution.
    #[serde(default)]
    pub rename_columns: HashMap<String, String>,
}

impl QueryDescriptor {
    pub fn label(&self) -> &str {
        if let Some(alias) = &self.alias {
            return alias;
        }
        match &self.target {
            QueryTarget::Stored { query_id, .. } => query_id,
            QueryTarget::Provider { provider_id, .. } => provider_id,
        }
    }
}

/// Per-group metric over a source column.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MetricSpec {
    pub column: String,
    #[serde(default)]
    pub agg: AggregateFn,
    #[serde(default)]
    pub alias: Option<String>,
}

impl MetricSpec {
    /// Output column name: explicit alias or `{column}_{agg}`.
    pub fn output_name(&self) -> String {
        self.alias
            .clone()
            .unwrap_or_else(|| format!("{}_{}", self.column, self.agg.name()))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFn {
    #[default]
    Sum,
    Mean,
    Count,
    Min,
    Max,
}

impl AggregateFn {
    pub fn name(&self) -> &'static str {
        match self {
            AggregateFn::Sum => "sum",
            AggregateFn::Mean => "mean",
            AggregateFn::Count => "count",
            AggregateFn::Min => "min",
            AggregateFn::Max => "max",
        }
    }
}

/// Group-by aggregation applied after the merge step.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AggregationSpec {
    pub group_by: Vec<String>,
    pub metrics: Vec<MetricSpec>,
}

/// Full join request: N query descriptors merged on a key-column set.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JoinSpec {
    pub queries: Vec<QueryDescriptor>,
    /// Column names expected, post-rename, in every participating table.
    pub join_on: Vec<String>,
    #[serde(default)]
    pub how: JoinMode,
    #[serde(default)]
    pub aggregation: Option<AggregationSpec>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_template_parse_literal() {
        assert_eq!(
            TemplateValue::parse(&json!("2020")),
            TemplateValue::Literal(json!("2020"))
        );
        assert_eq!(
            TemplateValue::parse(&json!(42)),
            TemplateValue::Literal(json!(42))
        );
        // Empty braces carry no substitution key
        assert_eq!(
            TemplateValue::parse(&json!("{}")),
            TemplateValue::Literal(json!("{}"))
        );
    }

    #[test]
    fn test_template_parse_placeholder() {
        assert_eq!(
            TemplateValue::parse(&json!("{from}")),
            TemplateValue::Placeholder {
                name: "from".to_string(),
                hint: None
            }
        );
        assert_eq!(
            TemplateValue::parse(&json!("{from mm-yyyy}")),
            TemplateValue::Placeholder {
                name: "from".to_string(),
                hint: Some("mm-yyyy".to_string())
            }
        );
        assert_eq!(
            TemplateValue::parse(&json!("{region north|south}")),
            TemplateValue::Placeholder {
                name: "region".to_string(),
                hint: Some("north|south".to_string())
            }
        );
        // Surrounding whitespace is tolerated
        assert_eq!(
            TemplateValue::parse(&json!("  {to}  ")),
            TemplateValue::Placeholder {
                name: "to".to_string(),
                hint: None
            }
        );
    }

    #[test]
    fn test_template_serde_roundtrip() {
        let raw = json!({"endpoint": "estimates/national", "from": "{from mm-yyyy}"});
        let parsed: BTreeMap<String, TemplateValue> = serde_json::from_value(raw.clone()).unwrap();
        assert!(parsed["from"].is_placeholder());
        assert!(!parsed["endpoint"].is_placeholder());

        let back = serde_json::to_value(&parsed).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn test_provider_credential_redacted_on_serialize() {
        let yaml = r#"
provider_id: census
type: rest
credential: super-secret
"#;
        let config: ProviderConfig = serde_yaml::from_str(yaml).unwrap();
        let out = serde_json::to_string(&config).unwrap();
        assert!(!out.contains("super-secret"));
        assert!(out.contains("[REDACTED]"));
    }

    #[test]
    fn test_stored_query_search_match() {
        let query: StoredQuery = serde_json::from_value(json!({
            "query_id": "fbi_violent_2020",
            "query_name": "Violent crime 2020",
            "description": "National violent crime estimates",
            "provider_id": "fbi_crime",
            "parameters": {},
            "tags": ["crime", "national"]
        }))
        .unwrap();

        assert!(query.matches("violent"));
        assert!(query.matches("CRIME"));
        assert!(query.matches("national"));
        assert!(!query.matches("agriculture"));
    }

    #[test]
    fn test_query_descriptor_untagged_targets() {
        let provider: QueryDescriptor = serde_json::from_value(json!({
            "provider_id": "census",
            "parameters": {"year": "2020"},
            "alias": "pop"
        }))
        .unwrap();
        assert!(matches!(provider.target, QueryTarget::Provider { .. }));
        assert_eq!(provider.label(), "pop");

        let stored: QueryDescriptor = serde_json::from_value(json!({
            "query_id": "census_pop_2020"
        }))
        .unwrap();
        assert!(matches!(stored.target, QueryTarget::Stored { .. }));
        assert_eq!(stored.label(), "census_pop_2020");
    }

    #[test]
    fn test_metric_output_name_defaults() {
        let metric: MetricSpec =
            serde_json::from_value(json!({"column": "value", "agg": "mean"})).unwrap();
        assert_eq!(metric.output_name(), "value_mean");

        let aliased: MetricSpec =
            serde_json::from_value(json!({"column": "value", "alias": "total"})).unwrap();
        assert_eq!(aliased.output_name(), "total");
        assert_eq!(aliased.agg, AggregateFn::Sum);
    }
}
