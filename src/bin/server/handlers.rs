//! HTTP handlers for the sketchd server

use super::types::*;
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use sketchd::config::ApplicationConfig;
use sketchd::engine::SketchEngine;
use sketchd::ingestion::IngestionCoordinator;
use sketchd::metrics::ExportMetrics;
use sketchd::query::{parse_query, QueryOutcome, QueryReconciler};
use sketchd::types::SeriesKey;
use std::sync::Arc;
use tracing::{error, info};

// =============================================================================
// Application State
// =============================================================================

/// Shared application state
pub struct AppState {
    /// Batch ingestion coordinator
    pub coordinator: IngestionCoordinator,
    /// Coverage-aware query reconciler
    pub reconciler: QueryReconciler,
    /// Sketch engine handle, used directly by the debug endpoint
    pub engine: Arc<dyn SketchEngine>,
    /// Exported prometheus metrics
    pub export: Arc<ExportMetrics>,
    /// Effective configuration
    pub config: ApplicationConfig,
}

// =============================================================================
// Health & Metrics
// =============================================================================

/// Liveness probe
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "UP",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Prometheus exposition endpoint
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.export.gather() {
        Ok(text) => (StatusCode::OK, [("content-type", "text/plain")], text).into_response(),
        Err(e) => {
            error!(error = %e, "metrics encoding failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

// =============================================================================
// Ingest
// =============================================================================

/// Ingest a batch of samples
///
/// The whole batch is processed before responding; a sample whose insert
/// fails is dropped without failing the batch, and the reported count covers
/// successful inserts only.
pub async fn ingest(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<IngestRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(request) = match payload {
        Ok(json) => json,
        Err(rejection) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: format!("Invalid JSON payload: {}", rejection.body_text()),
                }),
            )
                .into_response();
        }
    };

    let metrics = request
        .metrics
        .into_iter()
        .map(|m| sketchd::ingestion::MetricSample {
            name: m.name,
            labels: m.labels,
            value: m.value,
        })
        .collect();

    let report = state
        .coordinator
        .ingest_batch(request.timestamp, metrics)
        .await;

    (
        StatusCode::OK,
        Json(IngestResponse {
            status: "success",
            ingested_metrics_count: report.inserted,
        }),
    )
        .into_response()
}

// =============================================================================
// Query
// =============================================================================

/// Query-engine entry point
pub async fn parse(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ParseParams>,
) -> impl IntoResponse {
    let Some(expr) = params.q else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Missing query parameter 'q'".to_string(),
            }),
        )
            .into_response();
    };
    info!(query = %expr, "received query");

    let parsed = match parse_query(&expr) {
        Ok(parsed) => parsed,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response();
        }
    };

    let now = Utc::now().timestamp_millis();
    match state.reconciler.reconcile(&parsed, now).await {
        Ok(QueryOutcome::Pending) => (
            StatusCode::ACCEPTED,
            Json(QueryStatusResponse {
                status: "pending",
                message: "Sketch data is being prepared. Please try again in a few moments."
                    .to_string(),
            }),
        )
            .into_response(),
        Ok(QueryOutcome::OutOfRange) => (
            StatusCode::BAD_REQUEST,
            Json(QueryStatusResponse {
                status: "failed",
                message: "Query time range is outside of sketch data coverage.".to_string(),
            }),
        )
            .into_response(),
        Ok(QueryOutcome::Success {
            points,
            annotations,
        }) => {
            info!(points = points.len(), "evaluation successful");
            (
                StatusCode::OK,
                Json(QueryResponse {
                    status: "success",
                    data: points,
                    annotations,
                }),
            )
                .into_response()
        }
        Err(e) => {
            error!(error = %e, "evaluation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(QueryStatusResponse {
                    status: "error",
                    message: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

// =============================================================================
// Debug
// =============================================================================

/// Maximum number of synthetic series the debug endpoint will probe.
const DEBUG_STATE_MAX_LIMIT: usize = 100_000;

/// Enumerate synthetic series and report which have known coverage
///
/// Operational inspection only: probes `{prefix}_0 .. {prefix}_{limit-1}`
/// under the given metric and function.
pub async fn debug_state(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DebugStateParams>,
) -> impl IntoResponse {
    info!("starting state check");
    let limit = params.limit.min(DEBUG_STATE_MAX_LIMIT);
    let instance_label = state.config.query.instance_label.clone();

    let mut detail = Vec::new();
    for i in 0..limit {
        let key = SeriesKey::builder()
            .metric_name(&params.metric)
            .label(&instance_label, format!("{}_{}", params.prefix, i))
            .build();

        if let Some(cov) = state.engine.coverage(&key, &params.function) {
            detail.push(format!("{}_{}: {} -> {}", params.prefix, i, cov.min, cov.max));
        }
    }

    let found = detail.len();
    info!(found, "state check finished");
    let message = if found == 0 {
        "No active sketches found.".to_string()
    } else {
        format!("Found {} active sketches.", found)
    };

    Json(DebugStateResponse {
        status: "state check finished",
        found_sketches: found,
        sketch_coverage: detail,
        message,
    })
}
