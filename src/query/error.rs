//! Query error types
//!
//! Client-input failures (malformed expressions, unsupported shapes) are
//! distinguished from execution failures so the transport layer can map them
//! to the right status codes.

use std::fmt;

/// Query error with context
#[derive(Debug)]
pub struct QueryError {
    /// Error kind for programmatic handling
    pub kind: QueryErrorKind,
    /// Human-readable message
    pub message: String,
}

impl QueryError {
    /// Create a new query error
    pub fn new(kind: QueryErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create a parse error (malformed expression)
    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(QueryErrorKind::ParseError, message)
    }

    /// Create a validation error (well-formed but unsupported shape)
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(QueryErrorKind::ValidationError, message)
    }

    /// Create an execution error
    pub fn execution(message: impl Into<String>) -> Self {
        Self::new(QueryErrorKind::ExecutionError, message)
    }

    /// True for errors caused by the client's input, which are reported
    /// immediately and never retried.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.kind,
            QueryErrorKind::ParseError | QueryErrorKind::ValidationError
        )
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for QueryError {}

/// Categories of query errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Expression syntax error
    ParseError,
    /// Expression is well-formed but uses an unsupported shape
    ValidationError,
    /// Evaluation failed inside the engine
    ExecutionError,
}

impl fmt::Display for QueryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryErrorKind::ParseError => write!(f, "ParseError"),
            QueryErrorKind::ValidationError => write!(f, "ValidationError"),
            QueryErrorKind::ExecutionError => write!(f, "ExecutionError"),
        }
    }
}

/// Result type alias for query operations
pub type QueryResult<T> = std::result::Result<T, QueryError>;
