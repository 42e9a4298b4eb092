//! Join pipeline command: execute a multi-query join spec from a file
//! and optionally run an analysis plan on the joined table.

use super::helpers::CliContext;
use crate::output::{self, OutputFormat};
use anyhow::{Context, Result};
use fedstat_common::models::JoinSpec;
use fedstat_engine::{AnalysisDispatcher, AnalysisPlan, QueryOptions};
use owo_colors::OwoColorize;
use serde::Serialize;

#[derive(Serialize)]
struct JoinOutput {
    record_count: usize,
    records: Vec<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    analysis: Option<serde_json::Value>,
}

pub async fn join(
    ctx: &CliContext,
    spec_file: &str,
    analysis_file: Option<&str>,
    no_cache: bool,
    format: OutputFormat,
) -> Result<()> {
    let raw = std::fs::read_to_string(spec_file)
        .with_context(|| format!("Failed to read join spec: {}", spec_file))?;
    let spec: JoinSpec = serde_yaml::from_str(&raw)
        .with_context(|| format!("Invalid join spec: {}", spec_file))?;

    let opts = QueryOptions {
        use_cache: if no_cache { Some(false) } else { None },
        deadline: None,
    };
    let table = ctx.join.join_to_table(&spec, &opts).await?;

    let analysis = match analysis_file {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read analysis plan: {}", path))?;
            let plan: AnalysisPlan = serde_yaml::from_str(&raw)
                .with_context(|| format!("Invalid analysis plan: {}", path))?;
            let report = AnalysisDispatcher::new().run_analysis(&table, &plan);
            Some(serde_json::to_value(&report)?)
        }
        None => None,
    };

    let records = table.to_records();
    if format.is_machine_readable() {
        return output::print_output(
            format,
            JoinOutput {
                record_count: records.len(),
                records,
                analysis,
            },
        );
    }

    println!(
        "{} Joined {} queries into {} rows",
        "✔".green(),
        spec.queries.len(),
        records.len()
    );
    println!("{}", serde_json::to_string_pretty(&records)?);
    if let Some(report) = &analysis {
        println!("{}", "Analysis".bold());
        println!("{}", serde_json::to_string_pretty(report)?);
    }
    Ok(())
}
