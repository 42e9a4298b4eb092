//! Row-oriented tabular model for join and aggregation.
//!
//! Payloads from heterogeneous providers flatten into a `Table`: one row per
//! record, one column per field. Cells carry an explicit absence marker so
//! "missing because of a non-matching outer join" stays distinguishable from
//! a legitimate null in the source data.

use fedstat_common::models::{AggregateFn, AggregationSpec, JoinMode};
use fedstat_error::{ErrorCode, ErrorContext, FedstatError, Result};
use std::collections::HashMap;

/// A single table cell. `Absent` marks a value missing structurally, which
/// is distinct from `Value(Null)` read from the source.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Absent,
    Value(serde_json::Value),
}

impl Cell {
    pub fn is_absent(&self) -> bool {
        matches!(self, Cell::Absent)
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Value(serde_json::Value::Number(n)) => n.as_f64(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self { columns, rows }
    }

    /// Flatten a connector payload into a table.
    ///
    /// Accepts the normalized `{"data": [...]}` envelope or a bare record
    /// array. Columns appear in first-seen order (this needs serde_json's
    /// `preserve_order` feature, enabled workspace-wide); records missing
    /// a field get the absence marker there.
    pub fn from_payload(payload: &serde_json::Value) -> Result<Self> {
        let records = match payload {
            serde_json::Value::Object(map) => match map.get("data") {
                Some(serde_json::Value::Array(records)) => records.as_slice(),
                _ => {
                    return Err(FedstatError::new(
                        ErrorCode::SerializationFailed,
                        "Payload has no 'data' record array",
                    ))
                }
            },
            serde_json::Value::Array(records) => records.as_slice(),
            _ => {
                return Err(FedstatError::new(
                    ErrorCode::SerializationFailed,
                    "Payload is neither a record array nor a data envelope",
                ))
            }
        };

        let mut columns: Vec<String> = Vec::new();
        for record in records {
            if let serde_json::Value::Object(map) = record {
                for key in map.keys() {
                    if !columns.iter().any(|c| c == key) {
                        columns.push(key.clone());
                    }
                }
            }
        }

        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|column| match record.get(column) {
                        Some(value) => Cell::Value(value.clone()),
                        None => Cell::Absent,
                    })
                    .collect()
            })
            .collect();

        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.rows.iter().map(Vec::as_slice)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Columns named in `keys` that this table lacks.
    pub fn missing_columns(&self, keys: &[String]) -> Vec<String> {
        keys.iter()
            .filter(|k| !self.has_column(k))
            .cloned()
            .collect()
    }

    /// Apply a column-rename map in place. Unknown source names are ignored.
    pub fn rename_columns(&mut self, renames: &HashMap<String, String>) {
        for column in &mut self.columns {
            if let Some(renamed) = renames.get(column) {
                *column = renamed.clone();
            }
        }
    }

    /// Serialize to flat record-oriented JSON. Absent cells render as null.
    pub fn to_records(&self) -> Vec<serde_json::Value> {
        self.rows
            .iter()
            .map(|row| {
                let mut record = serde_json::Map::new();
                for (column, cell) in self.columns.iter().zip(row) {
                    let value = match cell {
                        Cell::Absent => serde_json::Value::Null,
                        Cell::Value(v) => v.clone(),
                    };
                    record.insert(column.clone(), value);
                }
                serde_json::Value::Object(record)
            })
            .collect()
    }

    fn key_of(&self, row: &[Cell], key_indices: &[usize]) -> String {
        let mut rendered = String::new();
        for &idx in key_indices {
            match &row[idx] {
                Cell::Absent => rendered.push_str("\u{1}absent"),
                Cell::Value(v) => rendered.push_str(&v.to_string()),
            }
            rendered.push('\u{1f}');
        }
        rendered
    }

    /// Merge `right` into this table on the key columns.
    ///
    /// Non-key right columns whose name collides with an existing column are
    /// suffixed `_{right_alias}`.
    pub fn merge(&self, right: &Table, keys: &[String], mode: JoinMode, right_alias: &str) -> Result<Table> {
        let left_key_indices: Vec<usize> = keys
            .iter()
            .filter_map(|k| self.column_index(k))
            .collect();
        let right_key_indices: Vec<usize> = keys
            .iter()
            .filter_map(|k| right.column_index(k))
            .collect();
        if left_key_indices.len() != keys.len() || right_key_indices.len() != keys.len() {
            return Err(FedstatError::new(
                ErrorCode::Internal,
                "Join keys were not validated before merge",
            ));
        }

        // Right-side payload columns, collision-suffixed
        let mut out_columns = self.columns.clone();
        let mut right_payload: Vec<(usize, String)> = Vec::new();
        for (idx, column) in right.columns.iter().enumerate() {
            if keys.contains(column) {
                continue;
            }
            let name = if out_columns.iter().any(|c| c == column) {
                format!("{}_{}", column, right_alias)
            } else {
                column.clone()
            };
            out_columns.push(name.clone());
            right_payload.push((idx, name));
        }

        let mut right_by_key: HashMap<String, Vec<usize>> = HashMap::new();
        for (row_idx, row) in right.rows.iter().enumerate() {
            let key = right.key_of(row, &right_key_indices);
            right_by_key.entry(key).or_default().push(row_idx);
        }

        let mut out_rows: Vec<Vec<Cell>> = Vec::new();
        let mut matched_right: Vec<bool> = vec![false; right.rows.len()];

        for row in &self.rows {
            let key = self.key_of(row, &left_key_indices);
            match right_by_key.get(&key) {
                Some(matches) => {
                    for &right_idx in matches {
                        matched_right[right_idx] = true;
                        let mut out = row.clone();
                        for (src_idx, _) in &right_payload {
                            out.push(right.rows[right_idx][*src_idx].clone());
                        }
                        out_rows.push(out);
                    }
                }
                None => {
                    if mode != JoinMode::Inner {
                        let mut out = row.clone();
                        out.extend(std::iter::repeat_n(Cell::Absent, right_payload.len()));
                        out_rows.push(out);
                    }
                }
            }
        }

        if mode == JoinMode::Outer {
            for (right_idx, seen) in matched_right.iter().enumerate() {
                if *seen {
                    continue;
                }
                let right_row = &right.rows[right_idx];
                let mut out = vec![Cell::Absent; self.columns.len()];
                for (key_pos, &left_idx) in left_key_indices.iter().enumerate() {
                    out[left_idx] = right_row[right_key_indices[key_pos]].clone();
                }
                for (src_idx, _) in &right_payload {
                    out.push(right_row[*src_idx].clone());
                }
                out_rows.push(out);
            }
        }

        Ok(Table::new(out_columns, out_rows))
    }

    /// Group by the spec's columns and compute each metric per group.
    /// Absent cells never contribute to a metric.
    pub fn aggregate(&self, spec: &AggregationSpec) -> Result<Table> {
        for column in &spec.group_by {
            if !self.has_column(column) {
                return Err(unknown_column("aggregation.group_by", column, &self.columns));
            }
        }
        for metric in &spec.metrics {
            if !self.has_column(&metric.column) {
                return Err(unknown_column("aggregation.metrics", &metric.column, &self.columns));
            }
        }

        let group_indices: Vec<usize> = spec
            .group_by
            .iter()
            .filter_map(|c| self.column_index(c))
            .collect();

        // Group rows, preserving first-appearance order
        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
        for (row_idx, row) in self.rows.iter().enumerate() {
            let key = self.key_of(row, &group_indices);
            if !groups.contains_key(&key) {
                order.push(key.clone());
            }
            groups.entry(key).or_default().push(row_idx);
        }

        let mut out_columns = spec.group_by.clone();
        for metric in &spec.metrics {
            out_columns.push(metric.output_name());
        }

        let mut out_rows = Vec::with_capacity(order.len());
        for key in order {
            let row_indices = &groups[&key];
            let first = &self.rows[row_indices[0]];
            let mut out: Vec<Cell> = group_indices.iter().map(|&i| first[i].clone()).collect();

            for metric in &spec.metrics {
                let col = self
                    .column_index(&metric.column)
                    .ok_or_else(|| FedstatError::new(ErrorCode::Internal, "column vanished"))?;
                let cells: Vec<&Cell> = row_indices
                    .iter()
                    .map(|&i| &self.rows[i][col])
                    .filter(|c| !c.is_absent())
                    .collect();
                out.push(compute_metric(metric.agg, &cells));
            }
            out_rows.push(out);
        }

        Ok(Table::new(out_columns, out_rows))
    }
}

pub(crate) fn unknown_column(section: &str, column: &str, available: &[String]) -> FedstatError {
    let mut err = FedstatError::new(
        ErrorCode::UnknownColumn,
        format!("Column '{}' not found in table", column),
    )
    .with_context(ErrorContext::UnknownColumn {
        section: section.to_string(),
        column: column.to_string(),
        available_columns: available.to_vec(),
    });
    let options: Vec<&str> = available.iter().map(String::as_str).collect();
    if let Some(closest) = fedstat_error::find_closest_match(column, &options) {
        err = err.with_hint(format!("Did you mean '{}'?", closest));
    }
    err
}

/// Render an f64 back to JSON, collapsing integral values to integers so
/// `sum` of integer columns stays integer-shaped.
fn number(value: f64) -> Cell {
    if value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
        Cell::Value(serde_json::Value::from(value as i64))
    } else {
        Cell::Value(serde_json::Value::from(value))
    }
}

fn compute_metric(agg: AggregateFn, cells: &[&Cell]) -> Cell {
    // Count is over present cells of any type; numeric metrics skip
    // non-numeric cells.
    if agg == AggregateFn::Count {
        return Cell::Value(serde_json::Value::from(cells.len() as u64));
    }

    let values: Vec<f64> = cells.iter().filter_map(|c| c.as_f64()).collect();
    match agg {
        AggregateFn::Sum => number(values.iter().sum()),
        AggregateFn::Mean => {
            if values.is_empty() {
                Cell::Absent
            } else {
                number(values.iter().sum::<f64>() / values.len() as f64)
            }
        }
        AggregateFn::Min => values
            .iter()
            .copied()
            .fold(None::<f64>, |acc, v| Some(acc.map_or(v, |a| a.min(v))))
            .map_or(Cell::Absent, number),
        AggregateFn::Max => values
            .iter()
            .copied()
            .fold(None::<f64>, |acc, v| Some(acc.map_or(v, |a| a.max(v))))
            .map_or(Cell::Absent, number),
        AggregateFn::Count => unreachable!("handled above"),
    }
}
