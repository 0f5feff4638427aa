//! Request and Response Types for the sketchd HTTP server
//!
//! All serialization/deserialization types used by the HTTP API.

use serde::{Deserialize, Serialize};
use sketchd::query::QueryPoint;
use std::collections::HashMap;

// =============================================================================
// Ingest API Types
// =============================================================================

/// Ingest request body
///
/// One batch of samples sharing a single timestamp. Each metric entry
/// addresses its own series via name plus labels.
#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    /// Unix timestamp in milliseconds applied to every metric in the batch
    pub timestamp: i64,
    /// Metric entries
    pub metrics: Vec<MetricPayload>,
}

/// Single metric entry in an ingest request
#[derive(Debug, Deserialize)]
pub struct MetricPayload {
    /// Metric name
    pub name: String,
    /// Label set (e.g. {"instance": "machine_0"})
    #[serde(default)]
    pub labels: HashMap<String, String>,
    /// Measurement value
    pub value: f64,
}

/// Ingest response
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub status: &'static str,
    /// Number of samples successfully inserted
    pub ingested_metrics_count: usize,
}

// =============================================================================
// Query API Types
// =============================================================================

/// Query string parameters for GET /parse
#[derive(Debug, Deserialize)]
pub struct ParseParams {
    /// The query expression
    pub q: Option<String>,
}

/// Successful query response
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub status: &'static str,
    pub data: Vec<QueryPoint>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<String>,
}

/// Response for pending or failed (but expected) query states
#[derive(Debug, Serialize)]
pub struct QueryStatusResponse {
    pub status: &'static str,
    pub message: String,
}

/// Generic error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// =============================================================================
// Admin Types
// =============================================================================

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Query string parameters for GET /debug-state
#[derive(Debug, Deserialize)]
pub struct DebugStateParams {
    /// Metric name of the synthetic series to probe
    #[serde(default = "default_debug_metric")]
    pub metric: String,
    /// Instance label value prefix; series probed are `{prefix}_0..`
    #[serde(default = "default_debug_prefix")]
    pub prefix: String,
    /// Function whose coverage is probed
    #[serde(default = "default_debug_function")]
    pub function: String,
    /// Number of synthetic series to probe
    #[serde(default = "default_debug_limit")]
    pub limit: usize,
}

fn default_debug_metric() -> String {
    "fake_machine_metric".to_string()
}

fn default_debug_prefix() -> String {
    "machine".to_string()
}

fn default_debug_function() -> String {
    "avg_over_time".to_string()
}

fn default_debug_limit() -> usize {
    10_000
}

/// Response from GET /debug-state
#[derive(Debug, Serialize)]
pub struct DebugStateResponse {
    pub status: &'static str,
    pub found_sketches: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sketch_coverage: Vec<String>,
    pub message: String,
}
