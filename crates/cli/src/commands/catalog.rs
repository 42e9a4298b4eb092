//! Catalog inspection commands: stored queries, providers, cache.

use super::helpers::CliContext;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use fedstat_common::models::StoredQuery;
use owo_colors::OwoColorize;
use serde::Serialize;

#[derive(Serialize)]
struct QueryList {
    queries: Vec<StoredQuery>,
}

fn print_query_lines(queries: &[StoredQuery]) {
    for query in queries {
        let marker = if query.active {
            "●".green().to_string()
        } else {
            "○".red().to_string()
        };
        println!(
            "{} {} [{}] {}",
            marker,
            query.query_id.bold(),
            query.provider_id,
            query.query_name
        );
        if !query.tags.is_empty() {
            println!("    tags: {}", query.tags.join(", "));
        }
    }
}

/// List stored queries, optionally filtered by provider.
pub async fn list_queries(
    ctx: &CliContext,
    provider: Option<&str>,
    active_only: bool,
    format: OutputFormat,
) -> Result<()> {
    let queries = ctx
        .engine
        .stored_queries()
        .list(provider, active_only)
        .await;

    if format.is_machine_readable() {
        return output::print_success(format, QueryList { queries });
    }

    if queries.is_empty() {
        println!("No stored queries found");
        return Ok(());
    }
    print_query_lines(&queries);
    Ok(())
}

/// Search stored queries by id, name, description, or tag.
pub async fn search_queries(ctx: &CliContext, term: &str, format: OutputFormat) -> Result<()> {
    let queries = ctx.engine.stored_queries().search(term).await;

    if format.is_machine_readable() {
        return output::print_success(format, QueryList { queries });
    }

    if queries.is_empty() {
        println!("No stored queries match '{}'", term);
        return Ok(());
    }
    print_query_lines(&queries);
    Ok(())
}

#[derive(Serialize)]
struct ProviderList<'a> {
    providers: Vec<&'a fedstat_common::models::ProviderConfig>,
}

/// List configured providers. Credentials are redacted by the model's
/// serializer, so machine output is safe to pipe.
pub async fn list_providers(ctx: &CliContext, format: OutputFormat) -> Result<()> {
    let providers = ctx.engine.providers();

    if format.is_machine_readable() {
        return output::print_success(format, ProviderList { providers });
    }

    if providers.is_empty() {
        println!("No providers configured");
        return Ok(());
    }
    for provider in providers {
        let marker = if provider.active {
            "●".green().to_string()
        } else {
            "○".red().to_string()
        };
        println!(
            "{} {} ({})",
            marker,
            provider.provider_id.bold(),
            provider.provider_type
        );
    }
    Ok(())
}

/// Probe a provider's health out of band.
pub async fn validate_provider(
    ctx: &CliContext,
    provider_id: &str,
    format: OutputFormat,
) -> Result<()> {
    let status = ctx.engine.validate_provider(provider_id).await?;

    if format.is_machine_readable() {
        return output::print_success(format, &status);
    }

    if status.is_healthy() {
        println!("{} Provider '{}' is healthy", "✔".green(), provider_id);
    } else if status.connected {
        println!(
            "{} Provider '{}' reachable but not authenticated: {}",
            "✘".red(),
            provider_id,
            status.detail.as_deref().unwrap_or("no detail")
        );
    } else {
        println!(
            "{} Provider '{}' is unreachable: {}",
            "✘".red(),
            provider_id,
            status.detail.as_deref().unwrap_or("no detail")
        );
    }
    Ok(())
}

/// Show cache and provider statistics.
pub async fn stats(ctx: &CliContext, format: OutputFormat) -> Result<()> {
    let stats = ctx.engine.stats().await;

    if format.is_machine_readable() {
        return output::print_success(format, &stats);
    }

    println!("{}", "Engine statistics".bold());
    println!(
        "  providers: {} ({} active)",
        stats.providers, stats.active_providers
    );
    println!(
        "  cache: {} entries, {} hits, {} misses",
        stats.cache.size, stats.cache.hits, stats.cache.misses
    );
    Ok(())
}

#[derive(Serialize)]
struct InvalidateResult {
    provider_id: String,
    removed: usize,
}

/// Drop all cache entries for a provider.
pub async fn invalidate_cache(
    ctx: &CliContext,
    provider_id: &str,
    format: OutputFormat,
) -> Result<()> {
    let removed = ctx.engine.invalidate_cache(provider_id).await;

    if format.is_machine_readable() {
        return output::print_success(
            format,
            InvalidateResult {
                provider_id: provider_id.to_string(),
                removed,
            },
        );
    }

    println!(
        "{} Removed {} cache entries for '{}'",
        "✔".green(),
        removed,
        provider_id
    );
    Ok(())
}
