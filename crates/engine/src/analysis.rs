//! Declarative analysis dispatch.
//!
//! An analysis plan maps section names to section-specific configuration.
//! Each section routes to a registered `AnalysisRoutine`. Sections are
//! independent: a failing section becomes an error entry in the report and
//! never discards the other sections or the underlying table.
//!
//! The statistical/ML routines themselves are pluggable; only
//! `basic_statistics` ships here. Heavier sections (regression, PCA,
//! hypothesis tests) register through the same trait.

use crate::table::{unknown_column, Cell, Table};
use fedstat_error::{ErrorCode, FedstatError, Result};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

pub type AnalysisPlan = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Default, Serialize)]
pub struct AnalysisReport {
    /// Section name to routine output, or `{"error": ...}` on failure.
    pub sections: BTreeMap<String, serde_json::Value>,
}

impl AnalysisReport {
    pub fn has_errors(&self) -> bool {
        self.sections.values().any(|v| v.get("error").is_some())
    }
}

/// One pluggable analysis section.
pub trait AnalysisRoutine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Columns the configuration references; each must exist in the table
    /// before `run` is invoked.
    fn referenced_columns(&self, config: &serde_json::Value) -> Vec<String>;

    fn run(&self, table: &Table, config: &serde_json::Value) -> Result<serde_json::Value>;
}

pub struct AnalysisDispatcher {
    routines: HashMap<&'static str, Box<dyn AnalysisRoutine>>,
}

impl Default for AnalysisDispatcher {
    fn default() -> Self {
        let mut dispatcher = Self {
            routines: HashMap::new(),
        };
        dispatcher.register(Box::new(BasicStatistics));
        dispatcher
    }
}

impl AnalysisDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, routine: Box<dyn AnalysisRoutine>) {
        self.routines.insert(routine.name(), routine);
    }

    pub fn section_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.routines.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Run every section of the plan against the table.
    ///
    /// A section whose configuration is `false` or `null` is skipped, so
    /// plans can toggle sections without deleting them.
    pub fn run_analysis(&self, table: &Table, plan: &AnalysisPlan) -> AnalysisReport {
        let mut report = AnalysisReport::default();

        for (section, config) in plan {
            if matches!(config, serde_json::Value::Bool(false) | serde_json::Value::Null) {
                continue;
            }
            let outcome = self.run_section(table, section, config);
            let entry = match outcome {
                Ok(output) => output,
                Err(e) => {
                    warn!(section = %section, error = %e, "Analysis section failed");
                    serde_json::json!({ "error": e })
                }
            };
            report.sections.insert(section.clone(), entry);
        }

        report
    }

    fn run_section(
        &self,
        table: &Table,
        section: &str,
        config: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let routine = self.routines.get(section).ok_or_else(|| {
            let names = self.section_names();
            let mut err = FedstatError::new(
                ErrorCode::UnknownAnalysisSection,
                format!("No analysis routine registered for section '{}'", section),
            );
            if let Some(closest) = fedstat_error::find_closest_match(section, &names) {
                err = err.with_hint(format!("Did you mean '{}'?", closest));
            }
            err
        })?;

        for column in routine.referenced_columns(config) {
            if !table.has_column(&column) {
                return Err(unknown_column(section, &column, table.columns()));
            }
        }

        routine.run(table, config)
    }
}

/// Descriptive statistics over the table's numeric columns.
pub struct BasicStatistics;

impl BasicStatistics {
    fn target_columns(table: &Table, config: &serde_json::Value) -> Vec<String> {
        match config.get("columns").and_then(|c| c.as_array()) {
            Some(columns) => columns
                .iter()
                .filter_map(|c| c.as_str().map(str::to_string))
                .collect(),
            // Default to every column with at least one numeric cell
            None => table
                .columns()
                .iter()
                .filter(|column| {
                    let idx = table.column_index(column);
                    idx.is_some_and(|idx| {
                        table
                            .rows()
                            .any(|row| matches!(&row[idx], Cell::Value(serde_json::Value::Number(_))))
                    })
                })
                .cloned()
                .collect(),
        }
    }
}

impl AnalysisRoutine for BasicStatistics {
    fn name(&self) -> &'static str {
        "basic_statistics"
    }

    fn referenced_columns(&self, config: &serde_json::Value) -> Vec<String> {
        config
            .get("columns")
            .and_then(|c| c.as_array())
            .map(|columns| {
                columns
                    .iter()
                    .filter_map(|c| c.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn run(&self, table: &Table, config: &serde_json::Value) -> Result<serde_json::Value> {
        let mut numeric_summary = serde_json::Map::new();
        let mut missing_values = serde_json::Map::new();

        for column in Self::target_columns(table, config) {
            let idx = match table.column_index(&column) {
                Some(idx) => idx,
                None => continue,
            };

            let mut values: Vec<f64> = Vec::new();
            let mut missing = 0usize;
            for row in table.rows() {
                match &row[idx] {
                    Cell::Absent | Cell::Value(serde_json::Value::Null) => missing += 1,
                    Cell::Value(serde_json::Value::Number(n)) => {
                        if let Some(v) = n.as_f64() {
                            values.push(v);
                        }
                    }
                    Cell::Value(_) => {}
                }
            }
            missing_values.insert(column.clone(), serde_json::json!(missing));

            if values.is_empty() {
                continue;
            }
            let count = values.len() as f64;
            let sum: f64 = values.iter().sum();
            let mean = sum / count;
            let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count;
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

            numeric_summary.insert(
                column,
                serde_json::json!({
                    "count": values.len(),
                    "sum": sum,
                    "mean": mean,
                    "std": variance.sqrt(),
                    "min": min,
                    "max": max,
                }),
            );
        }

        Ok(serde_json::json!({
            "row_count": table.row_count(),
            "column_count": table.columns().len(),
            "numeric_summary": numeric_summary,
            "missing_values": missing_values,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_table() -> Table {
        Table::from_payload(&json!([
            {"state": "CA", "v": 10},
            {"state": "CA", "v": 20},
            {"state": "TX"}
        ]))
        .unwrap()
    }

    fn plan(raw: serde_json::Value) -> AnalysisPlan {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn test_basic_statistics_section() {
        let dispatcher = AnalysisDispatcher::new();
        let report = dispatcher.run_analysis(&sample_table(), &plan(json!({
            "basic_statistics": true
        })));

        let stats = &report.sections["basic_statistics"];
        assert_eq!(stats["row_count"], json!(3));
        assert_eq!(stats["numeric_summary"]["v"]["sum"], json!(30.0));
        assert_eq!(stats["numeric_summary"]["v"]["mean"], json!(15.0));
        assert_eq!(stats["missing_values"]["v"], json!(1));
        assert!(!report.has_errors());
    }

    #[test]
    fn test_unknown_section_is_isolated() {
        let dispatcher = AnalysisDispatcher::new();
        let report = dispatcher.run_analysis(&sample_table(), &plan(json!({
            "basic_statistics": {"columns": ["v"]},
            "basic_sattistics": true
        })));

        assert!(report.has_errors());
        assert!(report.sections["basic_sattistics"]["error"]["code"]
            .as_str()
            .unwrap()
            .contains("3004"));
        // The healthy section still ran
        assert_eq!(
            report.sections["basic_statistics"]["numeric_summary"]["v"]["count"],
            json!(2)
        );
    }

    #[test]
    fn test_unknown_column_fails_only_its_section() {
        let dispatcher = AnalysisDispatcher::new();
        let report = dispatcher.run_analysis(&sample_table(), &plan(json!({
            "basic_statistics": {"columns": ["vv"]}
        })));

        let error = &report.sections["basic_statistics"]["error"];
        assert!(error["code"].as_str().unwrap().contains("3002"));
        assert_eq!(error["hint"], json!("Did you mean 'v'?"));
    }

    #[test]
    fn test_false_sections_are_skipped() {
        let dispatcher = AnalysisDispatcher::new();
        let report = dispatcher.run_analysis(&sample_table(), &plan(json!({
            "basic_statistics": false
        })));
        assert!(report.sections.is_empty());
    }
}
