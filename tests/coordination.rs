//! End-to-end coordination tests
//!
//! Exercises the ingestion coordinator and query reconciler together against
//! the in-memory engine, plus the cross-batch admission bound with an
//! instrumented engine double.

use async_trait::async_trait;
use sketchd::engine::traits::{EvalSample, Evaluation};
use sketchd::engine::{InMemorySketchEngine, SketchEngine};
use sketchd::error::EngineError;
use sketchd::ingestion::{AdmissionController, IngestionCoordinator, IngestionStats, MetricSample};
use sketchd::metrics::ExportMetrics;
use sketchd::query::{parse_query, QueryOutcome, QueryReconciler, SizingPolicy};
use sketchd::types::{Coverage, SeriesKey};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Test Helpers
// =============================================================================

struct TestStack {
    coordinator: IngestionCoordinator,
    reconciler: QueryReconciler,
    engine: Arc<InMemorySketchEngine>,
    stats: Arc<IngestionStats>,
}

fn build_stack(bound: usize) -> TestStack {
    let engine = Arc::new(InMemorySketchEngine::new());
    let export = Arc::new(ExportMetrics::new("instance").unwrap());
    let stats = Arc::new(IngestionStats::new());

    let coordinator = IngestionCoordinator::new(
        engine.clone(),
        Arc::new(AdmissionController::new(bound)),
        Arc::clone(&stats),
        Arc::clone(&export),
    );
    let reconciler = QueryReconciler::new(engine.clone(), SizingPolicy::default(), export);

    TestStack {
        coordinator,
        reconciler,
        engine,
        stats,
    }
}

fn cpu_batch(values: &[f64]) -> Vec<MetricSample> {
    values
        .iter()
        .map(|v| MetricSample {
            name: "cpu".to_string(),
            labels: HashMap::from([("instance".to_string(), "m0".to_string())]),
            value: *v,
        })
        .collect()
}

// =============================================================================
// Ingest-then-query scenarios
// =============================================================================

#[tokio::test]
async fn test_ingest_batch_counts_and_counter() {
    let stack = build_stack(3);

    let report = stack
        .coordinator
        .ingest_batch(1_000, cpu_batch(&[1.0, 2.0, 3.0]))
        .await;

    assert_eq!(report.inserted, 3);
    assert_eq!(stack.stats.ingested_total(), 3);

    // A second batch accumulates onto the same counter.
    stack
        .coordinator
        .ingest_batch(2_000, cpu_batch(&[4.0]))
        .await;
    assert_eq!(stack.stats.ingested_total(), 4);
}

#[tokio::test]
async fn test_query_before_ingestion_is_pending() {
    let stack = build_stack(3);
    let query = parse_query("avg_over_time(cpu{instance=\"m0\"}[60000ms])").unwrap();

    let outcome = stack.reconciler.reconcile(&query, 1_000_000).await.unwrap();
    assert_eq!(outcome, QueryOutcome::Pending);
    assert_eq!(stack.engine.instantiate_calls(), 1);
}

#[tokio::test]
async fn test_query_after_ingestion_evaluates() {
    let stack = build_stack(3);
    let query = parse_query("avg_over_time(cpu{instance=\"m0\"}[60000ms])").unwrap();

    // First query triggers materialization.
    let outcome = stack.reconciler.reconcile(&query, 100_000).await.unwrap();
    assert_eq!(outcome, QueryOutcome::Pending);

    // Samples arrive.
    stack
        .coordinator
        .ingest_batch(70_000, cpu_batch(&[1.0]))
        .await;
    stack
        .coordinator
        .ingest_batch(80_000, cpu_batch(&[2.0]))
        .await;
    stack
        .coordinator
        .ingest_batch(90_000, cpu_batch(&[3.0]))
        .await;

    // Second identical query finds coverage and evaluates over it.
    let outcome = stack.reconciler.reconcile(&query, 100_000).await.unwrap();
    let QueryOutcome::Success { points, .. } = outcome else {
        panic!("expected success, got {:?}", outcome);
    };
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].value, 2.0);
    // The stub leaves timestamps unset; the reconciler anchors them to the
    // clamped maxt, which is the coverage max here.
    assert_eq!(points[0].timestamp, 90_000);
}

#[tokio::test]
async fn test_partial_batch_failure_reports_successes() {
    let stack = build_stack(3);

    // The in-memory engine rejects non-finite values; siblings proceed.
    let report = stack
        .coordinator
        .ingest_batch(1_000, cpu_batch(&[1.0, f64::NAN, 3.0]))
        .await;

    assert_eq!(report.received, 3);
    assert_eq!(report.inserted, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(stack.stats.ingested_total(), 2);
}

#[tokio::test]
async fn test_distinct_series_do_not_share_coverage() {
    let stack = build_stack(3);

    stack
        .coordinator
        .ingest_batch(
            1_000,
            vec![MetricSample {
                name: "cpu".to_string(),
                labels: HashMap::from([("instance".to_string(), "m0".to_string())]),
                value: 1.0,
            }],
        )
        .await;

    // Same metric, different instance label: separate series, no coverage.
    let query = parse_query("avg_over_time(cpu{instance=\"m1\"}[60000ms])").unwrap();
    let outcome = stack.reconciler.reconcile(&query, 2_000).await.unwrap();
    assert_eq!(outcome, QueryOutcome::Pending);
}

// =============================================================================
// Global admission bound
// =============================================================================

/// Engine double that tracks how many inserts run concurrently.
struct ConcurrencyProbe {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyProbe {
    fn new() -> Self {
        Self {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SketchEngine for ConcurrencyProbe {
    fn engine_id(&self) -> &str {
        "concurrency-probe"
    }

    async fn insert(&self, _: &SeriesKey, _: i64, _: f64) -> Result<(), EngineError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(3)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    fn coverage(&self, _: &SeriesKey, _: &str) -> Option<Coverage> {
        None
    }

    async fn instantiate(
        &self,
        _: &SeriesKey,
        _: &str,
        _: i64,
        _: usize,
        _: f64,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    async fn evaluate(
        &self,
        _: &str,
        _: &SeriesKey,
        _: f64,
        _: i64,
        _: i64,
        _: i64,
    ) -> Result<Evaluation, EngineError> {
        Ok(Evaluation {
            samples: vec![EvalSample {
                timestamp: 0,
                value: 0.0,
            }],
            annotations: vec![],
        })
    }
}

#[tokio::test]
async fn test_admission_bound_is_global_across_batches() {
    const BOUND: usize = 3;

    let probe = Arc::new(ConcurrencyProbe::new());
    let admission = Arc::new(AdmissionController::new(BOUND));
    let export = Arc::new(ExportMetrics::new("instance").unwrap());

    // Two coordinators sharing one admission pool, as concurrent request
    // handlers would.
    let make_coordinator = || {
        IngestionCoordinator::new(
            probe.clone(),
            Arc::clone(&admission),
            Arc::new(IngestionStats::new()),
            Arc::clone(&export),
        )
    };
    let left = Arc::new(make_coordinator());
    let right = Arc::new(make_coordinator());

    let left_task = {
        let left = Arc::clone(&left);
        tokio::spawn(async move { left.ingest_batch(1_000, cpu_batch(&[1.0; 12])).await })
    };
    let right_task = {
        let right = Arc::clone(&right);
        tokio::spawn(async move { right.ingest_batch(1_000, cpu_batch(&[2.0; 12])).await })
    };

    let left_report = left_task.await.unwrap();
    let right_report = right_task.await.unwrap();

    assert_eq!(left_report.inserted, 12);
    assert_eq!(right_report.inserted, 12);
    assert!(
        probe.peak.load(Ordering::SeqCst) <= BOUND,
        "peak concurrency {} exceeded bound {}",
        probe.peak.load(Ordering::SeqCst),
        BOUND
    );
}
