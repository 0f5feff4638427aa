//! Coverage-aware query reconciliation
//!
//! For each parsed query the reconciler consults the engine's coverage for
//! the (series, function) pair. With no coverage it triggers lazy
//! materialization and reports pending; with coverage it clamps the requested
//! trailing window to the covered intersection and evaluates. Engine output
//! is cleaned up before it reaches callers: non-finite values are dropped and
//! unset timestamps are rewritten to the query's reference instant.
//!
//! Per-(series, function) lifecycle as seen from here:
//!
//! ```text
//! Uninitialized --first query--> Materializing --engine side--> Ready
//! ```
//!
//! There is no transition out of Ready owned by this component; if the engine
//! evicts old data that is observed only as shrinking coverage bounds.

use crate::engine::SketchEngine;
use crate::error::Result;
use crate::metrics::ExportMetrics;
use crate::query::parser::ParsedQuery;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Sketch sizing hints passed to the engine on lazy materialization.
///
/// Policy knobs, not engine internals: the element budget caps sketch memory
/// and the precision hint tunes the error bound of whatever summary the
/// engine builds.
#[derive(Debug, Clone, Copy)]
pub struct SizingPolicy {
    /// Maximum sketch-internal element count
    pub item_budget: usize,
    /// Numeric precision / error-bound hint
    pub precision_hint: f64,
}

impl Default for SizingPolicy {
    fn default() -> Self {
        Self {
            item_budget: 100_000,
            precision_hint: 10_000.0,
        }
    }
}

/// One data point of a successful query result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QueryPoint {
    /// Timestamp in milliseconds; never zero in returned results
    pub timestamp: i64,
    /// Finite evaluated value
    pub value: f64,
}

/// Outcome of reconciling one query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// No coverage yet; materialization has been requested. The caller
    /// should poll again: there is no completion signal.
    Pending,
    /// The requested window and the covered window are disjoint. Expected,
    /// not an error.
    OutOfRange,
    /// Evaluation ran over the clamped window.
    Success {
        /// Cleaned-up result points
        points: Vec<QueryPoint>,
        /// Advisory annotations passed through from the engine
        annotations: Vec<String>,
    },
}

/// Reconciles parsed queries against sketch coverage.
pub struct QueryReconciler {
    engine: Arc<dyn SketchEngine>,
    sizing: SizingPolicy,
    export: Arc<ExportMetrics>,
}

impl QueryReconciler {
    /// Create a reconciler.
    pub fn new(
        engine: Arc<dyn SketchEngine>,
        sizing: SizingPolicy,
        export: Arc<ExportMetrics>,
    ) -> Self {
        Self {
            engine,
            sizing,
            export,
        }
    }

    /// Reconcile one query against coverage, using `now_ms` as the query's
    /// reference instant.
    ///
    /// Engine evaluation errors propagate as-is; everything else maps onto
    /// one of the [`QueryOutcome`] variants.
    pub async fn reconcile(&self, query: &ParsedQuery, now_ms: i64) -> Result<QueryOutcome> {
        let mut mint = now_ms - query.range_ms;
        let mut maxt = now_ms;

        let coverage = self.engine.coverage(&query.key, &query.func);
        debug!(
            series = %query.key,
            func = %query.func,
            ?coverage,
            requested_mint = mint,
            requested_maxt = maxt,
            "coverage lookup"
        );

        let Some(coverage) = coverage else {
            info!(
                series = %query.key,
                func = %query.func,
                "no coverage yet, requesting materialization"
            );
            self.engine
                .instantiate(
                    &query.key,
                    &query.func,
                    query.range_ms,
                    self.sizing.item_budget,
                    self.sizing.precision_hint,
                )
                .await?;
            return Ok(QueryOutcome::Pending);
        };

        // Clamp the requested window to the covered intersection.
        mint = mint.max(coverage.min);
        maxt = maxt.min(coverage.max);

        if maxt <= mint {
            return Ok(QueryOutcome::OutOfRange);
        }

        debug!(mint, maxt, "reconciled window, evaluating");
        let evaluation = self
            .engine
            .evaluate(&query.func, &query.key, query.arg, mint, maxt, maxt)
            .await?;

        let metric = query.key.metric_name().unwrap_or("");
        let instance = query.key.get(self.export.instance_label());

        let mut points = Vec::with_capacity(evaluation.samples.len());
        for sample in &evaluation.samples {
            // Non-finite results are omitted, not errors.
            if !sample.value.is_finite() {
                continue;
            }
            // An unset timestamp would be ambiguous downstream; anchor it to
            // the reference instant.
            let timestamp = if sample.timestamp == 0 {
                maxt
            } else {
                sample.timestamp
            };
            points.push(QueryPoint {
                timestamp,
                value: sample.value,
            });
            self.export
                .record_query_result(&query.func, metric, instance, query.arg, sample.value);
        }

        Ok(QueryOutcome::Success {
            points,
            annotations: evaluation.annotations,
        })
    }
}
