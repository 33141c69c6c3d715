//! Error types for athena-sql.
//!
//! This module defines domain-specific error types organized by functional area.

use std::fmt;
use thiserror::Error;

/// Top-level error type encompassing all possible errors.
#[derive(Error, Debug)]
pub enum DriverError {
    /// Configuration and DSN errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Connection and credential errors
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Query validation and execution errors
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Row materialization errors
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// Errors returned by the remote query service
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Errors related to the driver configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// DSN could not be parsed or failed validation
    #[error("driver config is invalid: {0}")]
    InvalidConfig(String),

    /// Output location does not use the result-storage scheme
    #[error("output location must start with s3://, got '{0}'")]
    InvalidOutputLocation(String),

    #[error("region is required")]
    MissingRegion,

    #[error("AWS access ID is required")]
    MissingAccessId,

    #[error("AWS secret access key is required")]
    MissingSecretKey,

    /// Timeout overrides must be strictly positive
    #[error("service limit override '{name}' must be a positive number of seconds, got {value}")]
    InvalidServiceLimitOverride { name: String, value: i64 },

    /// A parameter value could not be interpreted
    #[error("invalid config parameter '{parameter}': {message}")]
    InvalidParameter { parameter: String, message: String },
}

/// Errors raised while opening or checking a connection.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Connection is unusable; callers should discard it
    #[error("bad connection: {0}")]
    BadConnection(String),

    /// Credentials could not be resolved
    #[error("failed to resolve AWS credentials: {0}")]
    Credentials(String),

    #[error("connection is closed")]
    ConnectionClosed,
}

/// Errors related to query validation and execution.
#[derive(Error, Debug)]
pub enum QueryError {
    /// Query text failed local validation
    #[error("query is not valid: {0}")]
    InvalidQuery(String),

    /// Interpolated query grew past the buffer ceiling
    #[error("query buffer overflow: {size} bytes exceeds {limit}")]
    BufferOverflow { size: usize, limit: usize },

    #[error("writing to Athena database is disallowed in read-only mode")]
    ReadOnlyViolation,

    #[error("workgroup \"{name}\" doesn't exist and workgroup remote creation is disabled")]
    WorkgroupMissing { name: String },

    #[error("workgroup \"{name}\" is disabled")]
    WorkgroupDisabled { name: String },

    /// Remote service reported the query as failed; reason is passed through verbatim
    #[error("{0}")]
    ExecutionFailed(String),

    /// Remote service cancelled the query
    #[error("query {query_id} was cancelled")]
    RemoteCancelled { query_id: String },

    /// Caller cancelled while the query was polling
    #[error("query cancelled by caller{}", stop_suffix(.stop_error))]
    CallerCancelled { stop_error: Option<RemoteError> },

    /// Caller deadline elapsed while the query was polling
    #[error("query deadline exceeded{}", stop_suffix(.stop_error))]
    DeadlineExceeded { stop_error: Option<RemoteError> },

    /// Client-side statement ceiling elapsed
    #[error("query timeout: {statement_type} statement exceeded {limit_secs}s")]
    Timeout {
        statement_type: String,
        limit_secs: u64,
    },

    #[error("Athena doesn't support transaction statements")]
    TransactionsUnsupported,

    #[error("pseudo command {0} doesn't exist")]
    UnknownPseudoCommand(String),

    /// Prepared statement has been closed
    #[error("prepared statement has been closed")]
    StatementClosed,
}

fn stop_suffix(stop_error: &Option<RemoteError>) -> String {
    match stop_error {
        Some(err) => format!(" (stopping the remote query failed: {})", err),
        None => String::new(),
    }
}

/// Errors raised while turning wire values into typed values.
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Missing data at column {column}")]
    MissingData { column: String },

    #[error("unknown value '{0}' for boolean")]
    UnknownBooleanLiteral(String),

    #[error("unknown column type `{0}`")]
    UnknownColumnType(String),

    #[error(transparent)]
    ParseInt(#[from] std::num::ParseIntError),

    #[error(transparent)]
    ParseFloat(#[from] std::num::ParseFloatError),

    /// Value did not match any supported date/time layout
    #[error("cannot parse '{value}' as {type_name}: {source}")]
    TimeParse {
        value: String,
        type_name: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("unknown time zone '{0}'")]
    UnknownTimeZone(String),
}

/// Errors returned by the remote query service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// A remote call failed
    #[error("{operation} failed: {message}")]
    Request { operation: String, message: String },

    /// A remote call succeeded but the response lacked a required field
    #[error("malformed {operation} response: {message}")]
    MalformedResponse { operation: String, message: String },
}

impl RemoteError {
    pub fn request(operation: &str, message: impl Into<String>) -> Self {
        RemoteError::Request {
            operation: operation.to_string(),
            message: message.into(),
        }
    }

    pub fn malformed(operation: &str, message: impl Into<String>) -> Self {
        RemoteError::MalformedResponse {
            operation: operation.to_string(),
            message: message.into(),
        }
    }
}

/// Coarse error classification.
///
/// Callers use this to tell cancellation apart from failure without matching
/// on every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected locally before any remote call
    Validation,
    /// Rejected by connection policy (read-only, workgroup state)
    Policy,
    /// Remote service failure or remote query failure
    Remote,
    /// Cancelled remotely or by the caller
    Cancelled,
    /// Client-side ceiling or caller deadline elapsed
    Timeout,
    /// Row materialization failure
    Conversion,
    /// Connection is unusable
    Connection,
    /// Operation is not supported by the service
    NotSupported,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Validation => write!(f, "VALIDATION"),
            ErrorKind::Policy => write!(f, "POLICY"),
            ErrorKind::Remote => write!(f, "REMOTE"),
            ErrorKind::Cancelled => write!(f, "CANCELLED"),
            ErrorKind::Timeout => write!(f, "TIMEOUT"),
            ErrorKind::Conversion => write!(f, "CONVERSION"),
            ErrorKind::Connection => write!(f, "CONNECTION"),
            ErrorKind::NotSupported => write!(f, "NOT_SUPPORTED"),
        }
    }
}

impl DriverError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DriverError::Config(_) => ErrorKind::Validation,
            DriverError::Connection(_) => ErrorKind::Connection,
            DriverError::Query(e) => e.kind(),
            DriverError::Conversion(_) => ErrorKind::Conversion,
            DriverError::Remote(_) => ErrorKind::Remote,
        }
    }

    /// True for remote and caller-initiated cancellation.
    pub fn is_cancellation(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }

    /// True for client-side ceilings and caller deadlines.
    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }
}

impl QueryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QueryError::InvalidQuery(_)
            | QueryError::BufferOverflow { .. }
            | QueryError::UnknownPseudoCommand(_)
            | QueryError::StatementClosed => ErrorKind::Validation,
            QueryError::ReadOnlyViolation
            | QueryError::WorkgroupMissing { .. }
            | QueryError::WorkgroupDisabled { .. } => ErrorKind::Policy,
            QueryError::ExecutionFailed(_) => ErrorKind::Remote,
            QueryError::RemoteCancelled { .. } | QueryError::CallerCancelled { .. } => {
                ErrorKind::Cancelled
            }
            QueryError::DeadlineExceeded { .. } | QueryError::Timeout { .. } => {
                ErrorKind::Timeout
            }
            QueryError::TransactionsUnsupported => ErrorKind::NotSupported,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = DriverError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workgroup_errors_name_the_workgroup() {
        let err = QueryError::WorkgroupMissing {
            name: "analytics".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "workgroup \"analytics\" doesn't exist and workgroup remote creation is disabled"
        );

        let err = QueryError::WorkgroupDisabled {
            name: "analytics".to_string(),
        };
        assert!(err.to_string().contains("is disabled"));
    }

    #[test]
    fn test_execution_failed_is_verbatim() {
        let err = QueryError::ExecutionFailed("SYNTAX_ERROR: line 1:8".to_string());
        assert_eq!(err.to_string(), "SYNTAX_ERROR: line 1:8");
    }

    #[test]
    fn test_caller_cancelled_display() {
        let err = QueryError::CallerCancelled { stop_error: None };
        assert_eq!(err.to_string(), "query cancelled by caller");

        let err = QueryError::CallerCancelled {
            stop_error: Some(RemoteError::request("StopQueryExecution", "throttled")),
        };
        assert!(err.to_string().contains("StopQueryExecution failed: throttled"));
    }

    #[test]
    fn test_error_kind_mapping() {
        let err = DriverError::from(QueryError::CallerCancelled { stop_error: None });
        assert!(err.is_cancellation());
        assert!(!err.is_timeout());

        let err = DriverError::from(QueryError::RemoteCancelled {
            query_id: "q".to_string(),
        });
        assert!(err.is_cancellation());

        let err = DriverError::from(QueryError::Timeout {
            statement_type: "DML".to_string(),
            limit_secs: 1800,
        });
        assert!(err.is_timeout());
        assert!(!err.is_cancellation());

        let err = DriverError::from(QueryError::ReadOnlyViolation);
        assert_eq!(err.kind(), ErrorKind::Policy);

        let err = DriverError::from(ConfigError::MissingRegion);
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::Cancelled.to_string(), "CANCELLED");
        assert_eq!(ErrorKind::NotSupported.to_string(), "NOT_SUPPORTED");
    }

    #[test]
    fn test_parse_errors_are_transparent() {
        let parse_err = "abc".parse::<i32>().unwrap_err();
        let expected = parse_err.to_string();
        let err = ConversionError::from(parse_err);
        assert_eq!(err.to_string(), expected);
    }

    #[test]
    fn test_missing_data_names_column() {
        let err = ConversionError::MissingData {
            column: "url".to_string(),
        };
        assert_eq!(err.to_string(), "Missing data at column url");
    }
}
