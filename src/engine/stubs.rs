//! In-memory sketch engine stub
//!
//! A reference implementation of [`SketchEngine`] intended for:
//! - **Unit and integration testing** without a real sketch library
//! - **Development and prototyping** of the coordination layer
//!
//! It stores raw samples per series and computes `*_over_time` aggregates
//! exactly instead of approximately, so tests can assert concrete values.
//! Like the production engines it models, it leaves result timestamps unset
//! (zero) and yields NaN for empty windows, which is exactly what the query
//! reconciler has to clean up.
//!
//! # Warning
//!
//! Not suitable for production use: it keeps every raw sample in memory and
//! never evicts, so coverage only ever grows.

use crate::engine::traits::{EvalSample, Evaluation, SketchEngine};
use crate::error::EngineError;
use crate::types::{Coverage, SeriesKey};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

/// Sizing hints recorded for one materialized (series, function) instance.
#[derive(Debug, Clone)]
struct InstanceState {
    window_ms: i64,
    item_budget: usize,
    precision_hint: f64,
}

/// In-memory sketch engine for tests and single-node development.
pub struct InMemorySketchEngine {
    /// Raw samples per series, ordered by timestamp
    samples: RwLock<HashMap<SeriesKey, BTreeMap<i64, f64>>>,
    /// Materialized (series, function) instances
    instances: RwLock<HashMap<(SeriesKey, String), InstanceState>>,
    /// Total instantiate calls, including duplicates
    instantiate_calls: AtomicU64,
}

impl InMemorySketchEngine {
    /// Create an empty engine.
    pub fn new() -> Self {
        Self {
            samples: RwLock::new(HashMap::new()),
            instances: RwLock::new(HashMap::new()),
            instantiate_calls: AtomicU64::new(0),
        }
    }

    /// Number of [`SketchEngine::instantiate`] calls received so far.
    ///
    /// Lets tests observe lazy-materialization triggers.
    pub fn instantiate_calls(&self) -> u64 {
        self.instantiate_calls.load(Ordering::Relaxed)
    }

    /// Number of distinct materialized (series, function) instances.
    pub fn instance_count(&self) -> usize {
        self.instances.read().len()
    }

    fn compute(func: &str, arg: f64, values: &[f64]) -> Result<(f64, Vec<String>), EngineError> {
        let mut annotations = Vec::new();

        if values.is_empty() {
            // Empty windows evaluate to NaN; the reconciler filters these out.
            return Ok((f64::NAN, annotations));
        }

        let n = values.len() as f64;
        let value = match func {
            "sum_over_time" => values.iter().sum(),
            "avg_over_time" => values.iter().sum::<f64>() / n,
            "count_over_time" => n,
            "min_over_time" => values.iter().cloned().fold(f64::INFINITY, f64::min),
            "max_over_time" => values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            "stddev_over_time" => {
                let mean = values.iter().sum::<f64>() / n;
                let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
                var.sqrt()
            }
            "quantile_over_time" => {
                if !(0.0..=1.0).contains(&arg) {
                    annotations.push(format!(
                        "quantile value should be between 0 and 1, got {}",
                        arg
                    ));
                }
                let mut sorted = values.to_vec();
                sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                quantile(&sorted, arg)
            }
            other => {
                return Err(EngineError::Evaluation(format!(
                    "unsupported function: {}",
                    other
                )))
            }
        };

        Ok((value, annotations))
    }
}

impl Default for InMemorySketchEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Linear-interpolation quantile over a sorted slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let clamped = q.clamp(0.0, 1.0);
    let rank = clamped * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let weight = rank - lo as f64;
        sorted[lo] * (1.0 - weight) + sorted[hi] * weight
    }
}

#[async_trait]
impl SketchEngine for InMemorySketchEngine {
    fn engine_id(&self) -> &str {
        "in-memory-v1"
    }

    async fn insert(
        &self,
        key: &SeriesKey,
        timestamp: i64,
        value: f64,
    ) -> Result<(), EngineError> {
        if key.metric_name().map_or(true, str::is_empty) {
            return Err(EngineError::InsertRejected(
                "sample has no metric name".to_string(),
            ));
        }
        if !value.is_finite() {
            return Err(EngineError::InsertRejected(format!(
                "non-finite value for {}",
                key
            )));
        }

        let mut samples = self.samples.write();
        samples.entry(key.clone()).or_default().insert(timestamp, value);
        Ok(())
    }

    fn coverage(&self, key: &SeriesKey, func: &str) -> Option<Coverage> {
        let instances = self.instances.read();
        if !instances.contains_key(&(key.clone(), func.to_string())) {
            return None;
        }
        drop(instances);

        let samples = self.samples.read();
        let series = samples.get(key)?;
        let min = *series.keys().next()?;
        let max = *series.keys().next_back()?;
        Some(Coverage::new(min, max))
    }

    async fn instantiate(
        &self,
        key: &SeriesKey,
        func: &str,
        window_ms: i64,
        item_budget: usize,
        precision_hint: f64,
    ) -> Result<(), EngineError> {
        self.instantiate_calls.fetch_add(1, Ordering::Relaxed);

        if window_ms <= 0 {
            return Err(EngineError::Instantiation(format!(
                "window must be positive, got {}ms",
                window_ms
            )));
        }

        let mut instances = self.instances.write();
        // Re-instantiating the same pair is a no-op: duplicate-trigger
        // suppression lives here, not in the coordinator.
        instances
            .entry((key.clone(), func.to_string()))
            .or_insert(InstanceState {
                window_ms,
                item_budget,
                precision_hint,
            });
        Ok(())
    }

    async fn evaluate(
        &self,
        func: &str,
        key: &SeriesKey,
        arg: f64,
        mint: i64,
        maxt: i64,
        _at: i64,
    ) -> Result<Evaluation, EngineError> {
        let samples = self.samples.read();
        let values: Vec<f64> = samples
            .get(key)
            .map(|series| series.range(mint..=maxt).map(|(_, v)| *v).collect())
            .unwrap_or_default();
        drop(samples);

        let (value, annotations) = Self::compute(func, arg, &values)?;

        Ok(Evaluation {
            // Aggregate results carry an unset timestamp, as the modeled
            // engines do; the reconciler substitutes the reference instant.
            samples: vec![EvalSample { timestamp: 0, value }],
            annotations,
        })
    }
}
