//! Query execution commands: direct provider queries and stored
//! queries with overrides.

use super::helpers::{parse_pairs, CliContext};
use crate::output::{self, OutputFormat};
use anyhow::Result;
use fedstat_common::models::{QueryResult, ResultSource};
use fedstat_engine::QueryOptions;
use owo_colors::OwoColorize;
use std::time::Duration;

/// Execute a direct query against a provider.
pub async fn query(
    ctx: &CliContext,
    provider_id: &str,
    params: &[String],
    no_cache: bool,
    timeout_secs: Option<u64>,
    format: OutputFormat,
) -> Result<()> {
    let parameters = parse_pairs(params)?;
    let opts = QueryOptions {
        use_cache: if no_cache { Some(false) } else { None },
        deadline: timeout_secs.map(Duration::from_secs),
    };

    let result = ctx.engine.execute_query(provider_id, &parameters, &opts).await;
    render_result(result, format)
}

/// Execute a stored query by id, with optional parameter overrides.
pub async fn run(
    ctx: &CliContext,
    query_id: &str,
    overrides: &[String],
    no_cache: bool,
    timeout_secs: Option<u64>,
    format: OutputFormat,
) -> Result<()> {
    let overrides = parse_pairs(overrides)?;
    let opts = QueryOptions {
        use_cache: if no_cache { Some(false) } else { None },
        deadline: timeout_secs.map(Duration::from_secs),
    };

    let result = ctx
        .engine
        .execute_stored_query(query_id, &overrides, &opts)
        .await;
    render_result(result, format)
}

fn render_result(result: QueryResult, format: OutputFormat) -> Result<()> {
    if !result.success {
        let err = result.error.unwrap_or_else(|| {
            fedstat_error::FedstatError::new(
                fedstat_error::ErrorCode::Internal,
                "Query failed without an error descriptor",
            )
        });
        return Err(err.into());
    }

    if format.is_machine_readable() {
        return output::print_output(format, &result);
    }

    let source = match result.source {
        Some(ResultSource::Cache) => "cache",
        _ => "connector",
    };
    if let Some(name) = &result.query_name {
        println!(
            "{} {} ({}) from {}",
            "✔".green(),
            name.bold(),
            result.provider_id,
            source
        );
    } else {
        println!("{} {} from {}", "✔".green(), result.provider_id.bold(), source);
    }
    for warning in &result.warnings {
        println!("{} {}", "⚠".yellow(), warning);
    }
    if let Some(payload) = &result.payload {
        println!("{}", serde_json::to_string_pretty(payload)?);
    }
    Ok(())
}
