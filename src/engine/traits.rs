//! Core trait definition for pluggable sketch engines

use crate::error::EngineError;
use crate::types::{Coverage, SeriesKey};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Black-box contract of the streaming sketch engine.
///
/// The engine internally synchronizes its own state; callers must not assume
/// any lock is held across calls. The coordinator performs one read
/// ([`coverage`](SketchEngine::coverage)) and two write-triggering calls
/// ([`insert`](SketchEngine::insert),
/// [`instantiate`](SketchEngine::instantiate)); coverage bounds move only as
/// a side effect of those engine-owned operations.
#[async_trait]
pub trait SketchEngine: Send + Sync + 'static {
    /// Unique identifier for this engine implementation
    fn engine_id(&self) -> &str;

    /// Insert one sample into the addressed series' sketches.
    ///
    /// Consumes the sample conceptually: the caller retains no ownership of
    /// the inserted value. Failures are per-sample and must not poison other
    /// series or other inserts.
    async fn insert(&self, key: &SeriesKey, timestamp: i64, value: f64)
        -> Result<(), EngineError>;

    /// Report how much time range is currently materialized for
    /// (series, function).
    ///
    /// Returns `None` while no sketch instance exists for the pair. Callers
    /// get the same answer on every call until materialization completes;
    /// a `Some` coverage may later shrink if the engine evicts old data.
    fn coverage(&self, key: &SeriesKey, func: &str) -> Option<Coverage>;

    /// Request lazy materialization of a sketch for (series, function).
    ///
    /// `window_ms` is the query window the instance should be sized for;
    /// `item_budget` caps sketch-internal element count and
    /// `precision_hint` tunes the error bound. Both hints are policy knobs
    /// owned by the caller's configuration. Whether repeated requests for
    /// the same pair deduplicate work is the engine's concern.
    async fn instantiate(
        &self,
        key: &SeriesKey,
        func: &str,
        window_ms: i64,
        item_budget: usize,
        precision_hint: f64,
    ) -> Result<(), EngineError>;

    /// Evaluate `func` over `[mint, maxt]` for the series.
    ///
    /// `at` is the reference instant the evaluation is anchored to. The
    /// returned samples may carry unset (zero) timestamps and non-finite
    /// values; cleaning those up is the caller's responsibility.
    async fn evaluate(
        &self,
        func: &str,
        key: &SeriesKey,
        arg: f64,
        mint: i64,
        maxt: i64,
        at: i64,
    ) -> Result<Evaluation, EngineError>;
}

/// One evaluated output point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvalSample {
    /// Timestamp in milliseconds; 0 means the engine left it unset
    pub timestamp: i64,
    /// Evaluated value; may be non-finite for empty or degenerate windows
    pub value: f64,
}

/// Result of one evaluation call.
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    /// Output points in engine order
    pub samples: Vec<EvalSample>,
    /// Advisory, non-fatal notes (e.g. partial-precision warnings)
    pub annotations: Vec<String>,
}
