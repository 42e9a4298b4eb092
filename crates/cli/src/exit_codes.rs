//! Structured exit codes for machine-readable error handling.
//!
//! These codes let wrapping scripts and schedulers distinguish
//! failure classes without parsing stderr.

/// Success (standard convention)
#[allow(dead_code)]
pub const SUCCESS: i32 = 0;

/// General error (fallback for unknown errors)
pub const GENERAL_ERROR: i32 = 1;

/// CLI usage error (invalid arguments, malformed key=value pairs)
pub const USAGE_ERROR: i32 = 2;

/// Configuration error (YAML parse failure, invalid catalog entry)
pub const CONFIG_ERROR: i32 = 3;

/// Connection error (provider unreachable, timeout, network failure)
pub const CONNECTION_ERROR: i32 = 4;

/// Validation error (unknown query, missing join key, unknown column)
pub const VALIDATION_ERROR: i32 = 5;
