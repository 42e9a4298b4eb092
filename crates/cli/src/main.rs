//! fedstat CLI: catalog-driven federated data retrieval.
//!
//! Commands operate against a declarative `catalog.yaml` that defines
//! providers and stored queries. Nothing persists between invocations;
//! each run builds a fresh engine with in-memory cache and catalog.
//!
//! # Core Commands
//!
//! - `query`: Execute a direct query against a provider.
//! - `run`: Execute a stored query by id, with overrides.
//! - `join`: Run a multi-query join pipeline from a spec file.
//!
//! # Exploration
//!
//! - `queries list` / `queries search`: Browse the stored-query catalog.
//! - `providers list` / `providers validate`: Inspect provider health.
//! - `cache stats` / `cache invalidate`: Cache introspection.

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use fedstat_error::ErrorCategory;
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;
mod output;

use output::OutputFormat;

#[derive(Parser)]
#[command(name = "fedstat")]
#[command(about = "Query and join data across federated statistical providers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (human, json, yaml)
    #[arg(long, global = true, value_enum, default_value = "human")]
    output: OutputFormat,

    /// Path to the provider and stored-query catalog
    #[arg(long, global = true, env = "FEDSTAT_CATALOG", default_value = "catalog.yaml")]
    catalog: String,

    /// Path to the engine configuration file
    #[arg(long, global = true, env = "FEDSTAT_CONFIG", default_value = "fedstat.yaml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a direct query against a provider
    Query {
        /// Provider id from the catalog
        provider: String,
        /// Query parameters as key=value pairs
        #[arg(short = 'p', long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
        /// Bypass the result cache for this call
        #[arg(long, default_value_t = false)]
        no_cache: bool,
        /// Abort the query after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Execute a stored query by id
    Run {
        /// Stored query id from the catalog
        query_id: String,
        /// Parameter overrides as key=value pairs
        #[arg(short = 'o', long = "override", value_name = "KEY=VALUE")]
        overrides: Vec<String>,
        /// Bypass the result cache for this call
        #[arg(long, default_value_t = false)]
        no_cache: bool,
        /// Abort the query after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Run a join pipeline from a spec file
    Join {
        /// Path to a YAML or JSON join spec
        spec: String,
        /// Path to an analysis plan to run on the joined table
        #[arg(long)]
        analyze: Option<String>,
        /// Bypass the result cache for all participating queries
        #[arg(long, default_value_t = false)]
        no_cache: bool,
    },
    /// Browse the stored-query catalog
    Queries {
        #[command(subcommand)]
        subcommand: QueryCommands,
    },
    /// Inspect configured providers
    Providers {
        #[command(subcommand)]
        subcommand: ProviderCommands,
    },
    /// Cache introspection and maintenance
    Cache {
        #[command(subcommand)]
        subcommand: CacheCommands,
    },
}

#[derive(Subcommand)]
enum QueryCommands {
    /// List stored queries
    List {
        /// Only show queries for this provider
        #[arg(long)]
        provider: Option<String>,
        /// Hide inactive queries
        #[arg(long, default_value_t = false)]
        active_only: bool,
    },
    /// Search stored queries by id, name, description, or tag
    Search {
        /// Search term
        term: String,
    },
}

#[derive(Subcommand)]
enum ProviderCommands {
    /// List configured providers
    List,
    /// Probe a provider's health
    Validate {
        /// Provider id from the catalog
        provider: String,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Show cache and provider statistics
    Stats,
    /// Drop all cache entries for a provider
    Invalidate {
        /// Provider id from the catalog
        provider: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run_cli(&cli).await {
        let exit_code = map_error_to_exit_code(&e);
        if cli.output.is_machine_readable() {
            let descriptor = e.downcast_ref::<fedstat_error::FedstatError>();
            output::print_error(cli.output, &e.to_string(), exit_code, descriptor).ok();
        } else {
            eprintln!("{} {}", "Error:".red().bold(), e);
            if let Some(hint) = e
                .downcast_ref::<fedstat_error::FedstatError>()
                .and_then(|err| err.hint.as_deref())
            {
                eprintln!("{} {}", "Hint:".yellow(), hint);
            }
        }
        std::process::exit(exit_code);
    }

    Ok(())
}

fn map_error_to_exit_code(e: &anyhow::Error) -> i32 {
    // Type-safe mapping for engine errors
    if let Some(err) = e.downcast_ref::<fedstat_error::FedstatError>() {
        return match err.code.category() {
            ErrorCategory::Provider => exit_codes::CONNECTION_ERROR,
            ErrorCategory::Query => exit_codes::VALIDATION_ERROR,
            ErrorCategory::Pipeline => exit_codes::VALIDATION_ERROR,
            ErrorCategory::Config => exit_codes::CONFIG_ERROR,
            ErrorCategory::Internal => exit_codes::GENERAL_ERROR,
            // ErrorCategory is non-exhaustive; future categories fall back
            _ => exit_codes::GENERAL_ERROR,
        };
    }

    // Fallback: string heuristics for wrapped errors
    let s = e.to_string().to_lowercase();
    if s.contains("key=value") || s.contains("argument") {
        return exit_codes::USAGE_ERROR;
    }
    if s.contains("config") || s.contains("yaml") || s.contains("catalog") {
        return exit_codes::CONFIG_ERROR;
    }
    if s.contains("connect") || s.contains("timeout") {
        return exit_codes::CONNECTION_ERROR;
    }
    exit_codes::GENERAL_ERROR
}

async fn run_cli(cli: &Cli) -> Result<(), anyhow::Error> {
    let ctx = commands::build_context(&cli.config, &cli.catalog).await?;

    match &cli.command {
        Commands::Query {
            provider,
            params,
            no_cache,
            timeout,
        } => {
            commands::query(&ctx, provider, params, *no_cache, *timeout, cli.output).await?;
        }
        Commands::Run {
            query_id,
            overrides,
            no_cache,
            timeout,
        } => {
            commands::run(&ctx, query_id, overrides, *no_cache, *timeout, cli.output).await?;
        }
        Commands::Join {
            spec,
            analyze,
            no_cache,
        } => {
            commands::join(&ctx, spec, analyze.as_deref(), *no_cache, cli.output).await?;
        }
        Commands::Queries { subcommand } => match subcommand {
            QueryCommands::List {
                provider,
                active_only,
            } => {
                commands::list_queries(&ctx, provider.as_deref(), *active_only, cli.output).await?;
            }
            QueryCommands::Search { term } => {
                commands::search_queries(&ctx, term, cli.output).await?;
            }
        },
        Commands::Providers { subcommand } => match subcommand {
            ProviderCommands::List => {
                commands::list_providers(&ctx, cli.output).await?;
            }
            ProviderCommands::Validate { provider } => {
                commands::validate_provider(&ctx, provider, cli.output).await?;
            }
        },
        Commands::Cache { subcommand } => match subcommand {
            CacheCommands::Stats => {
                commands::stats(&ctx, cli.output).await?;
            }
            CacheCommands::Invalidate { provider } => {
                commands::invalidate_cache(&ctx, provider, cli.output).await?;
            }
        },
    }

    Ok(())
}
