//! Structured output handling for CLI commands.

use fedstat_error::FedstatError;
use serde::Serialize;

#[derive(clap::ValueEnum, Clone, Debug, Default, PartialEq, Eq, Copy)]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
    Yaml,
}

impl OutputFormat {
    /// Returns true if the output format is intended for machine consumption
    pub fn is_machine_readable(&self) -> bool {
        match self {
            OutputFormat::Human => false,
            OutputFormat::Json | OutputFormat::Yaml => true,
        }
    }
}

/// Envelope for successful machine-readable responses
#[derive(Serialize)]
pub struct CommandResponse<T> {
    pub status: &'static str,
    pub exit_code: i32,
    #[serde(flatten)]
    pub data: T,
}

/// Envelope for failed machine-readable responses. Carries the full
/// error descriptor when the failure originated in the engine, so
/// consumers get the code, context, and hint, not just a message.
#[derive(Serialize)]
struct ErrorResponse<'a> {
    status: &'static str,
    message: &'a str,
    exit_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a FedstatError>,
}

/// Print the output to stdout in the requested format
pub fn print_output<T: Serialize>(format: OutputFormat, data: T) -> anyhow::Result<()> {
    match format {
        OutputFormat::Human => {
            // Human-readable output is printed incrementally by the
            // command itself.
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&data)?;
            println!("{}", json);
        }
        OutputFormat::Yaml => {
            let yaml = serde_yaml::to_string(&data)?;
            println!("{}", yaml);
        }
    }
    Ok(())
}

/// Print a structured success response for machine outputs
pub fn print_success<T: Serialize>(format: OutputFormat, data: T) -> anyhow::Result<()> {
    if format == OutputFormat::Human {
        return Ok(());
    }

    print_output(
        format,
        CommandResponse {
            status: "success",
            exit_code: 0,
            data,
        },
    )
}

/// Print a structured error response for machine outputs.
/// Human-mode errors go to stderr via main's error handler instead.
pub fn print_error(
    format: OutputFormat,
    message: &str,
    exit_code: i32,
    error: Option<&FedstatError>,
) -> anyhow::Result<()> {
    if format == OutputFormat::Human {
        return Ok(());
    }

    print_output(
        format,
        ErrorResponse {
            status: "error",
            message,
            exit_code,
            error,
        },
    )
}
