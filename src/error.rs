//! Error types for the coordination layer

use thiserror::Error;

/// Main error type
#[derive(Error, Debug)]
pub enum Error {
    /// Sketch engine error
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Ingestion error
    #[error("Ingestion error: {0}")]
    Ingestion(#[from] IngestionError),

    /// Query error
    #[error("Query error: {0}")]
    Query(#[from] crate::query::error::QueryError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by the external sketch engine.
///
/// The engine is a black box behind [`crate::engine::SketchEngine`]; these
/// variants classify its failures at the boundary without assuming anything
/// about its internals.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The engine refused or failed to insert a sample
    #[error("Insert rejected: {0}")]
    InsertRejected(String),

    /// Creating a new sketch instance failed
    #[error("Instantiation failed: {0}")]
    Instantiation(String),

    /// Evaluation of a function over a window failed
    #[error("Evaluation failed: {0}")]
    Evaluation(String),
}

/// Ingestion-path errors
#[derive(Error, Debug)]
pub enum IngestionError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A spawned sample task terminated abnormally
    #[error("Sample task failed: {0}")]
    TaskFailed(String),

    /// Validation of an incoming payload failed
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
