//! sketchd - Coordination layer for sketch-backed metrics ingestion and query
//!
//! This library coordinates a metrics service built around streaming sketch
//! summaries:
//! - Admission-controlled ingestion: batches of samples fan out to the
//!   sketch engine under a process-global concurrency bound
//! - Coverage-aware querying: requested windows are reconciled against what
//!   each sketch actually covers, with lazy materialization of missing
//!   sketches
//! - Throughput monitoring: a background service logging ingestion rates to
//!   a durable CSV sink
//!
//! The sketch engine itself (summary data structures, error bounds,
//! eviction) is an external collaborator behind the
//! [`engine::SketchEngine`] trait; an in-memory reference implementation is
//! provided for tests and development.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod engine;
pub mod error;
pub mod types;

/// Configuration management with TOML support
pub mod config;

/// Prometheus exposition metrics
pub mod metrics;

/// Admission-controlled ingestion pipeline
pub mod ingestion;

/// Query parsing and coverage reconciliation
pub mod query;

/// Background services (throughput monitoring)
pub mod services;

// Re-export main types
pub use engine::{InMemorySketchEngine, SketchEngine};
pub use error::{EngineError, Error, Result};
pub use ingestion::{AdmissionController, IngestionCoordinator, IngestionStats};
pub use query::{parse_query, QueryOutcome, QueryReconciler};
pub use types::{Coverage, Sample, SeriesKey};
