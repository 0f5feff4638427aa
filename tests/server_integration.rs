//! HTTP server integration tests
//!
//! Verifies the REST surface end to end: ingest admission, query
//! reconciliation states (pending, out-of-range, success), input validation,
//! health, and metrics exposition. The router here mirrors the one built in
//! the server binary, wired to the in-memory engine.

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Query, State},
    http::{Request, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use sketchd::engine::{InMemorySketchEngine, SketchEngine};
use sketchd::ingestion::{AdmissionController, IngestionCoordinator, IngestionStats, MetricSample};
use sketchd::metrics::ExportMetrics;
use sketchd::query::{parse_query, QueryOutcome, QueryReconciler, SizingPolicy};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

// =============================================================================
// Test Router (mirrors bin/server handlers)
// =============================================================================

struct TestAppState {
    coordinator: IngestionCoordinator,
    reconciler: QueryReconciler,
    export: Arc<ExportMetrics>,
    engine: Arc<InMemorySketchEngine>,
}

fn build_state() -> Arc<TestAppState> {
    let engine = Arc::new(InMemorySketchEngine::new());
    let export = Arc::new(ExportMetrics::new("instance").unwrap());
    let stats = Arc::new(IngestionStats::new());

    let coordinator = IngestionCoordinator::new(
        engine.clone() as Arc<dyn SketchEngine>,
        Arc::new(AdmissionController::new(3)),
        stats,
        Arc::clone(&export),
    );
    let reconciler = QueryReconciler::new(
        engine.clone() as Arc<dyn SketchEngine>,
        SizingPolicy::default(),
        Arc::clone(&export),
    );

    Arc::new(TestAppState {
        coordinator,
        reconciler,
        export,
        engine,
    })
}

#[derive(Deserialize)]
struct IngestRequest {
    timestamp: i64,
    metrics: Vec<MetricPayload>,
}

#[derive(Deserialize)]
struct MetricPayload {
    name: String,
    #[serde(default)]
    labels: HashMap<String, String>,
    value: f64,
}

#[derive(Deserialize)]
struct ParseParams {
    q: Option<String>,
}

async fn ingest(
    State(state): State<Arc<TestAppState>>,
    payload: Result<Json<IngestRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(request) = match payload {
        Ok(json) => json,
        Err(rejection) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("Invalid JSON payload: {}", rejection.body_text()) })),
            );
        }
    };

    let metrics = request
        .metrics
        .into_iter()
        .map(|m| MetricSample {
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
        Json(json!({
            "status": "success",
            "ingested_metrics_count": report.inserted,
        })),
    )
}

async fn parse(
    State(state): State<Arc<TestAppState>>,
    Query(params): Query<ParseParams>,
) -> impl IntoResponse {
    let Some(expr) = params.q else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Missing query parameter 'q'" })),
        );
    };

    let parsed = match parse_query(&expr) {
        Ok(parsed) => parsed,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": e.to_string() })),
            );
        }
    };

    let now = Utc::now().timestamp_millis();
    match state.reconciler.reconcile(&parsed, now).await {
        Ok(QueryOutcome::Pending) => (
            StatusCode::ACCEPTED,
            Json(json!({
                "status": "pending",
                "message": "Sketch data is being prepared. Please try again in a few moments.",
            })),
        ),
        Ok(QueryOutcome::OutOfRange) => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "status": "failed",
                "message": "Query time range is outside of sketch data coverage.",
            })),
        ),
        Ok(QueryOutcome::Success {
            points,
            annotations,
        }) => {
            let mut body = json!({ "status": "success", "data": points });
            if !annotations.is_empty() {
                body["annotations"] = json!(annotations);
            }
            (StatusCode::OK, Json(body))
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "status": "error", "message": e.to_string() })),
        ),
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "UP", "version": env!("CARGO_PKG_VERSION") }))
}

async fn metrics(State(state): State<Arc<TestAppState>>) -> impl IntoResponse {
    match state.export.gather() {
        Ok(text) => (StatusCode::OK, text),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

fn build_router(state: Arc<TestAppState>) -> Router {
    Router::new()
        .route("/ingest", post(ingest))
        .route("/parse", get(parse))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .with_state(state)
}

// =============================================================================
// Request Helpers
// =============================================================================

async fn post_json(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn get_raw(router: &Router, uri: &str) -> (StatusCode, String) {
    let response = router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8_lossy(&bytes).to_string())
}

async fn get_json(router: &Router, uri: &str) -> (StatusCode, Value) {
    let (status, text) = get_raw(router, uri).await;
    (status, serde_json::from_str(&text).unwrap_or(Value::Null))
}

fn ingest_body(timestamp: i64, values: &[f64]) -> Value {
    json!({
        "timestamp": timestamp,
        "metrics": values
            .iter()
            .map(|v| json!({
                "name": "cpu",
                "labels": { "instance": "m0" },
                "value": v,
            }))
            .collect::<Vec<_>>(),
    })
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_health() {
    let router = build_router(build_state());
    let (status, body) = get_json(&router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "UP");
}

#[tokio::test]
async fn test_ingest_batch_reports_count() {
    let router = build_router(build_state());

    let (status, body) = post_json(&router, "/ingest", ingest_body(1_000, &[1.0, 2.0, 3.0])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["ingested_metrics_count"], 3);

    // The cumulative counter shows up in the exposition.
    let (status, text) = get_raw(&router, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("sketchd_ingested_samples_total 3"));
    assert!(text.contains("sketchd_ingested_metrics"));
}

#[tokio::test]
async fn test_ingest_malformed_body() {
    let router = build_router(build_state());

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/ingest")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Well-formed JSON of the wrong shape is also a client error.
    let (status, body) = post_json(&router, "/ingest", json!({ "metrics": [] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Invalid JSON"));
}

#[tokio::test]
async fn test_ingest_partial_failure_still_succeeds() {
    let router = build_router(build_state());

    // The middle entry has no metric name, which the engine rejects; the
    // batch still returns 200 with the successful count.
    let body = json!({
        "timestamp": 1_000,
        "metrics": [
            { "name": "cpu", "labels": { "instance": "m0" }, "value": 1.0 },
            { "name": "", "labels": { "instance": "m0" }, "value": 2.0 },
            { "name": "cpu", "labels": { "instance": "m0" }, "value": 3.0 },
        ],
    });
    let (status, body) = post_json(&router, "/ingest", body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ingested_metrics_count"], 2);
}

#[tokio::test]
async fn test_query_before_ingestion_is_pending() {
    let router = build_router(build_state());

    let (status, body) = get_json(
        &router,
        "/parse?q=avg_over_time(cpu%7Binstance%3D%22m0%22%7D%5B60000ms%5D)",
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "pending");
    assert!(body["message"].as_str().unwrap().contains("prepared"));
}

#[tokio::test]
async fn test_query_full_flow() {
    let state = build_state();
    let router = build_router(Arc::clone(&state));
    let query_uri = "/parse?q=avg_over_time(cpu%7Binstance%3D%22m0%22%7D%5B60000ms%5D)";

    // First query: 202, materialization triggered.
    let (status, _) = get_json(&router, query_uri).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(state.engine.instantiate_calls(), 1);

    // Ingest samples inside the trailing window.
    let now = Utc::now().timestamp_millis();
    for (offset, value) in [(30_000, 2.0), (20_000, 4.0), (10_000, 6.0)] {
        let (status, _) = post_json(&router, "/ingest", ingest_body(now - offset, &[value])).await;
        assert_eq!(status, StatusCode::OK);
    }

    // Second query: clamped evaluation over the covered range.
    let (status, body) = get_json(&router, query_uri).await;
    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["status"], "success");
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["value"], 4.0);
    // Timestamp anchored to the clamped maxt, never zero.
    assert!(data[0]["timestamp"].as_i64().unwrap() > 0);

    // The query-result gauge is exported.
    let (_, text) = get_raw(&router, "/metrics").await;
    assert!(text.contains("sketchd_query_result"));
}

#[tokio::test]
async fn test_query_outside_coverage_fails() {
    let router = build_router(build_state());
    let query_uri = "/parse?q=avg_over_time(cpu%7Binstance%3D%22m0%22%7D%5B60000ms%5D)";

    // Materialize, then ingest samples far in the past.
    let (status, _) = get_json(&router, query_uri).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    post_json(&router, "/ingest", ingest_body(1_000, &[1.0])).await;
    post_json(&router, "/ingest", ingest_body(2_000, &[2.0])).await;

    // The trailing window ends now; coverage ended decades ago.
    let (status, body) = get_json(&router, query_uri).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "failed");
    assert!(body["message"].as_str().unwrap().contains("coverage"));
}

#[tokio::test]
async fn test_query_shape_violations() {
    let router = build_router(build_state());

    // Missing parameter.
    let (status, body) = get_json(&router, "/parse").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Missing query"));

    // Bare selector, not a function call.
    let (status, body) = get_json(&router, "/parse?q=cpu%7Binstance%3D%22m0%22%7D").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("function call"));

    // Missing range vector.
    let (status, body) = get_json(&router, "/parse?q=avg_over_time(cpu)").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("range vector"));

    // Regex matcher unsupported.
    let (status, body) = get_json(
        &router,
        "/parse?q=avg_over_time(cpu%7Binstance%3D~%22m.%2A%22%7D%5B5m%5D)",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("'='"));
}
