//! Local file connector.
//!
//! Reads CSV or JSON files from disk and serves them through the same
//! normalized payload envelope as the network connectors. Useful for
//! reference tables (state FIPS codes, population baselines) that join
//! against API results.
use crate::sources::{envelope, Connector, ConnectorError, ConnectorFactory, HealthStatus};
use async_trait::async_trait;
use fedstat_common::models::{ParameterMap, ProviderConfig};
use fedstat_error::{ErrorCode, ErrorContext, FedstatError};
use serde::Deserialize;
use std::path::PathBuf;

fn default_file_type() -> String {
    "auto".to_string()
}

fn default_delimiter() -> String {
    ",".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LocalFileSettings {
    pub file_path: PathBuf,
    /// "csv", "json", or "auto" to detect from the extension.
    #[serde(default = "default_file_type")]
    pub file_type: String,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    Csv { delimiter: u8 },
    Json,
}

pub struct LocalFileConnector {
    provider_id: String,
    source_name: String,
    settings: LocalFileSettings,
    connected: bool,
}

impl LocalFileConnector {
    fn detect_format(&self) -> Result<FileFormat, ConnectorError> {
        let delimiter = self.settings.delimiter.as_bytes().first().copied().unwrap_or(b',');
        match self.settings.file_type.to_lowercase().as_str() {
            "csv" => Ok(FileFormat::Csv { delimiter }),
            "json" => Ok(FileFormat::Json),
            "auto" => {
                let ext = self
                    .settings
                    .file_path
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("")
                    .to_lowercase();
                match ext.as_str() {
                    "csv" => Ok(FileFormat::Csv { delimiter }),
                    "tsv" => Ok(FileFormat::Csv { delimiter: b'\t' }),
                    "json" => Ok(FileFormat::Json),
                    other => Err(ConnectorError::bad_request(format!(
                        "Unsupported file extension '.{}' for '{}'",
                        other,
                        self.settings.file_path.display()
                    ))),
                }
            }
            other => Err(ConnectorError::bad_request(format!(
                "Unsupported file_type '{}'",
                other
            ))),
        }
    }

    async fn read_records(&self) -> Result<Vec<serde_json::Value>, ConnectorError> {
        let format = self.detect_format()?;
        let raw = tokio::fs::read_to_string(&self.settings.file_path)
            .await
            .map_err(|e| {
                ConnectorError::connection(format!(
                    "Failed to read '{}': {}",
                    self.settings.file_path.display(),
                    e
                ))
            })?;

        match format {
            FileFormat::Csv { delimiter } => parse_csv(&raw, delimiter),
            FileFormat::Json => parse_json(&raw),
        }
    }
}

fn parse_csv(raw: &str, delimiter: u8) -> Result<Vec<serde_json::Value>, ConnectorError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .from_reader(raw.as_bytes());
    let headers = reader
        .headers()
        .map_err(|e| ConnectorError::bad_request(format!("Invalid CSV header: {}", e)))?
        .clone();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| ConnectorError::bad_request(format!("Invalid CSV row: {}", e)))?;
        let mut object = serde_json::Map::new();
        for (header, field) in headers.iter().zip(row.iter()) {
            object.insert(header.to_string(), coerce_scalar(field));
        }
        records.push(serde_json::Value::Object(object));
    }
    Ok(records)
}

fn parse_json(raw: &str) -> Result<Vec<serde_json::Value>, ConnectorError> {
    let body: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| ConnectorError::bad_request(format!("Invalid JSON file: {}", e)))?;
    match body {
        serde_json::Value::Array(records) => Ok(records),
        serde_json::Value::Object(ref map) => match map.get("data") {
            Some(serde_json::Value::Array(records)) => Ok(records.clone()),
            _ => Ok(vec![body]),
        },
        other => Ok(vec![serde_json::json!({ "value": other })]),
    }
}

/// Interpret a CSV field as the narrowest JSON scalar it parses to.
fn coerce_scalar(field: &str) -> serde_json::Value {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return serde_json::Value::Null;
    }
    if let Ok(n) = trimmed.parse::<i64>() {
        return serde_json::Value::from(n);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        return serde_json::Value::from(f);
    }
    match trimmed {
        "true" => serde_json::Value::Bool(true),
        "false" => serde_json::Value::Bool(false),
        _ => serde_json::Value::String(field.to_string()),
    }
}

/// Loose equality for filter matching: raw value equality, or equality of
/// string renderings so `"2020"` matches the number `2020` read from CSV.
fn filter_matches(cell: &serde_json::Value, wanted: &serde_json::Value) -> bool {
    if cell == wanted {
        return true;
    }
    let render = |v: &serde_json::Value| match v {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    render(cell) == render(wanted)
}

fn apply_parameters(
    mut records: Vec<serde_json::Value>,
    parameters: &ParameterMap,
) -> Vec<serde_json::Value> {
    if let Some(serde_json::Value::Object(filters)) = parameters.get("filters") {
        records.retain(|record| {
            filters.iter().all(|(column, wanted)| {
                record
                    .get(column)
                    .map(|cell| filter_matches(cell, wanted))
                    .unwrap_or(false)
            })
        });
    }

    if let Some(serde_json::Value::Array(columns)) = parameters.get("columns") {
        let keep: Vec<&str> = columns.iter().filter_map(|c| c.as_str()).collect();
        if !keep.is_empty() {
            records = records
                .into_iter()
                .map(|record| {
                    let mut projected = serde_json::Map::new();
                    if let serde_json::Value::Object(map) = record {
                        for column in &keep {
                            if let Some(value) = map.get(*column) {
                                projected.insert(column.to_string(), value.clone());
                            }
                        }
                    }
                    serde_json::Value::Object(projected)
                })
                .collect();
        }
    }

    let offset = parameters
        .get("offset")
        .and_then(|v| v.as_u64())
        .unwrap_or(0) as usize;
    if offset > 0 {
        records = records.into_iter().skip(offset).collect();
    }

    if let Some(limit) = parameters.get("limit").and_then(|v| v.as_u64()) {
        records.truncate(limit as usize);
    }

    records
}

#[async_trait]
impl Connector for LocalFileConnector {
    async fn connect(&mut self) -> Result<(), ConnectorError> {
        let metadata = tokio::fs::metadata(&self.settings.file_path)
            .await
            .map_err(|e| {
                ConnectorError::connection(format!(
                    "File not found: '{}': {}",
                    self.settings.file_path.display(),
                    e
                ))
            })?;
        if !metadata.is_file() {
            return Err(ConnectorError::connection(format!(
                "'{}' is not a regular file",
                self.settings.file_path.display()
            )));
        }
        self.connected = true;
        tracing::debug!(provider_id = %self.provider_id, "Local file connector ready");
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.connected = false;
    }

    async fn query(&self, parameters: &ParameterMap) -> Result<serde_json::Value, ConnectorError> {
        if !self.connected {
            return Err(ConnectorError::connection(
                "Local file connector is not connected",
            ));
        }
        let records = self.read_records().await?;
        let records = apply_parameters(records, parameters);
        Ok(envelope(records, &self.source_name))
    }

    async fn validate(&mut self) -> HealthStatus {
        let result = match self.connect().await {
            Ok(()) => self.read_records().await.map(|_| ()),
            Err(e) => Err(e),
        };
        self.disconnect().await;
        match result {
            Ok(()) => HealthStatus::healthy(),
            Err(e) => HealthStatus::unreachable(e.to_string()),
        }
    }
}

pub struct LocalFileConnectorFactory;

impl ConnectorFactory for LocalFileConnectorFactory {
    fn type_name(&self) -> &'static str {
        "local_file"
    }

    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn Connector>, FedstatError> {
        let settings: LocalFileSettings =
            serde_json::from_value(config.settings.clone()).map_err(|e| {
                FedstatError::new(
                    ErrorCode::InvalidConfig,
                    format!(
                        "Invalid local_file settings for provider '{}': {}",
                        config.provider_id, e
                    ),
                )
                .with_context(ErrorContext::Config {
                    file_path: None,
                    field: Some("file_path".to_string()),
                })
            })?;

        Ok(Box::new(LocalFileConnector {
            provider_id: config.provider_id.clone(),
            source_name: config
                .provider_name
                .clone()
                .unwrap_or_else(|| config.provider_id.clone()),
            settings,
            connected: false,
        }))
    }
}
