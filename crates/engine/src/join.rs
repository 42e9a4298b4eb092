//! Multi-source join pipeline.
//!
//! Executes every descriptor in a `JoinSpec` through the query engine
//! (concurrently, since each query is independently cache-keyed), flattens
//! the payloads into tables, and folds them pairwise left-to-right on the
//! join key. The merge itself is a pure reduction over materialized tables.

use crate::query::{QueryEngine, QueryOptions};
use crate::table::Table;
use fedstat_common::models::{JoinSpec, QueryDescriptor, QueryResult, QueryTarget};
use fedstat_error::{ErrorCode, ErrorContext, FedstatError, Result};
use std::sync::Arc;
use tracing::debug;

pub struct JoinEngine {
    engine: Arc<QueryEngine>,
}

impl JoinEngine {
    pub fn new(engine: Arc<QueryEngine>) -> Self {
        Self { engine }
    }

    async fn execute_descriptor(
        &self,
        descriptor: &QueryDescriptor,
        opts: &QueryOptions,
    ) -> QueryResult {
        match &descriptor.target {
            QueryTarget::Stored {
                query_id,
                overrides,
            } => {
                self.engine
                    .execute_stored_query(query_id, overrides, opts)
                    .await
            }
            QueryTarget::Provider {
                provider_id,
                parameters,
            } => {
                self.engine
                    .execute_query(provider_id, parameters, opts)
                    .await
            }
        }
    }

    /// Execute all descriptors and merge the results into one table.
    pub async fn join_to_table(&self, spec: &JoinSpec, opts: &QueryOptions) -> Result<Table> {
        if spec.queries.len() < 2 {
            return Err(FedstatError::new(
                ErrorCode::InvalidJoinSpec,
                format!(
                    "A join needs at least 2 query descriptors, got {}",
                    spec.queries.len()
                ),
            )
            .with_hint("Use execute_query directly for a single source"));
        }
        if spec.join_on.is_empty() {
            return Err(FedstatError::new(
                ErrorCode::InvalidJoinSpec,
                "join_on must name at least one key column",
            ));
        }

        let results = futures::future::join_all(
            spec.queries
                .iter()
                .map(|descriptor| self.execute_descriptor(descriptor, opts)),
        )
        .await;

        let mut tables: Vec<(String, Table)> = Vec::with_capacity(results.len());
        for (descriptor, result) in spec.queries.iter().zip(results) {
            let label = descriptor.label().to_string();
            if !result.success {
                let err = result.error.unwrap_or_else(|| {
                    FedstatError::new(
                        ErrorCode::Internal,
                        "Query failed without an error descriptor",
                    )
                });
                return Err(err);
            }
            let payload = result.payload.ok_or_else(|| {
                FedstatError::new(
                    ErrorCode::Internal,
                    format!("Query '{}' succeeded without a payload", label),
                )
            })?;

            let mut table = Table::from_payload(&payload)?;
            table.rename_columns(&descriptor.rename_columns);

            let missing = table.missing_columns(&spec.join_on);
            if !missing.is_empty() {
                return Err(FedstatError::new(
                    ErrorCode::MissingJoinKey,
                    format!(
                        "Table '{}' is missing join key column(s): {}",
                        label,
                        missing.join(", ")
                    ),
                )
                .with_context(ErrorContext::MissingJoinKey {
                    alias: label.clone(),
                    missing_keys: missing,
                    available_columns: table.columns().to_vec(),
                })
                .with_hint("Add a rename_columns entry mapping a source column onto the join key"));
            }

            debug!(label = %label, rows = table.row_count(), "Join input materialized");
            tables.push((label, table));
        }

        let mut iter = tables.into_iter();
        let (_, mut merged) = iter
            .next()
            .ok_or_else(|| FedstatError::new(ErrorCode::Internal, "No tables to merge"))?;
        for (label, right) in iter {
            merged = merged.merge(&right, &spec.join_on, spec.how, &label)?;
        }

        match &spec.aggregation {
            Some(aggregation) => merged.aggregate(aggregation),
            None => Ok(merged),
        }
    }
}
