use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric error codes following FEDSTAT-XXXX format.
///
/// ## Code Ranges
/// - **1000-1999**: Provider/connection errors
/// - **2000-2999**: Query errors
/// - **3000-3999**: Join/analysis errors
/// - **4000-4999**: Configuration errors
/// - **5000-5999**: Internal/System errors
///
/// Codes are stable across versions (semver contract).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
#[non_exhaustive]
pub enum ErrorCode {
    // === Provider Errors (1000-1999) ===
    /// FEDSTAT-1001: Provider id not present in the catalog
    ProviderNotFound = 1001,
    /// FEDSTAT-1002: Provider exists but is flagged inactive
    ProviderInactive = 1002,
    /// FEDSTAT-1003: Endpoint unreachable or credential rejected at connect
    ConnectionFailed = 1003,
    /// FEDSTAT-1004: No connector implementation for the provider type
    UnsupportedProviderType = 1004,

    // === Query Errors (2000-2999) ===
    /// FEDSTAT-2001: Provider rejected the request parameters
    BadRequest = 2001,
    /// FEDSTAT-2002: Transient upstream failure, surfaced after retry exhaustion
    Transient = 2002,
    /// FEDSTAT-2003: Stored query absent or inactive
    StoredQueryNotFound = 2003,
    /// FEDSTAT-2004: Caller-supplied deadline elapsed
    QueryTimeout = 2004,

    // === Join/Analysis Errors (3000-3999) ===
    /// FEDSTAT-3001: A join key column is missing from a participating table
    MissingJoinKey = 3001,
    /// FEDSTAT-3002: Analysis plan references a column not in the table
    UnknownColumn = 3002,
    /// FEDSTAT-3003: Join specification is structurally invalid
    InvalidJoinSpec = 3003,
    /// FEDSTAT-3004: Analysis plan names a section with no registered routine
    UnknownAnalysisSection = 3004,

    // === Configuration Errors (4000-4999) ===
    /// FEDSTAT-4001: Catalog or application configuration invalid
    InvalidConfig = 4001,

    // === Internal Errors (5000-5999) ===
    /// FEDSTAT-5001: Serialization/deserialization failed
    SerializationFailed = 5001,
    /// FEDSTAT-5002: Unexpected internal state
    Internal = 5002,

    /// FEDSTAT-9999: Unknown/unclassified error
    Unknown = 9999,
}

impl ErrorCode {
    /// Get the numeric code value
    pub fn as_u16(&self) -> u16 {
        *self as u16
    }

    /// Get the formatted code string (e.g., "FEDSTAT-2001")
    pub fn as_str(&self) -> String {
        format!("FEDSTAT-{:04}", self.as_u16())
    }

    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self.as_u16() {
            1000..=1999 => ErrorCategory::Provider,
            2000..=2999 => ErrorCategory::Query,
            3000..=3999 => ErrorCategory::Pipeline,
            4000..=4999 => ErrorCategory::Config,
            _ => ErrorCategory::Internal,
        }
    }

    /// Whether the retry policy may re-attempt an operation that failed with
    /// this code. This is the single classification point the query engine
    /// consults; everything else surfaces immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient | Self::ConnectionFailed)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> String {
        code.as_str()
    }
}

impl TryFrom<String> for ErrorCode {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        let num: u16 = s
            .strip_prefix("FEDSTAT-")
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| "Invalid format".to_string())?;
        Self::try_from(num).map_err(|_| "Unknown code".to_string())
    }
}

impl TryFrom<u16> for ErrorCode {
    type Error = String;

    fn try_from(n: u16) -> std::result::Result<Self, Self::Error> {
        match n {
            1001 => Ok(Self::ProviderNotFound),
            1002 => Ok(Self::ProviderInactive),
            1003 => Ok(Self::ConnectionFailed),
            1004 => Ok(Self::UnsupportedProviderType),
            2001 => Ok(Self::BadRequest),
            2002 => Ok(Self::Transient),
            2003 => Ok(Self::StoredQueryNotFound),
            2004 => Ok(Self::QueryTimeout),
            3001 => Ok(Self::MissingJoinKey),
            3002 => Ok(Self::UnknownColumn),
            3003 => Ok(Self::InvalidJoinSpec),
            3004 => Ok(Self::UnknownAnalysisSection),
            4001 => Ok(Self::InvalidConfig),
            5001 => Ok(Self::SerializationFailed),
            5002 => Ok(Self::Internal),
            9999 => Ok(Self::Unknown),
            _ => Err(format!("Unknown error code: {}", n)),
        }
    }
}

/// High-level error category for API surfaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ErrorCategory {
    Provider,
    Query,
    Pipeline,
    Config,
    Internal,
}
