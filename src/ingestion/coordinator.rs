//! Batch ingestion coordination
//!
//! Consumes batches of incoming samples and fans each sample out to the
//! sketch engine under global admission control. Per-sample failures are
//! isolated: a failed insert is logged and dropped without aborting its
//! siblings, and the batch always runs to completion.

use crate::engine::SketchEngine;
use crate::ingestion::admission::AdmissionController;
use crate::ingestion::metrics::IngestionStats;
use crate::metrics::ExportMetrics;
use crate::types::{Sample, SeriesKey};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// One metric entry of an ingestion batch, as received at the boundary.
#[derive(Debug, Clone)]
pub struct MetricSample {
    /// Metric name
    pub name: String,
    /// Label set, not including the metric name
    pub labels: HashMap<String, String>,
    /// Measurement value
    pub value: f64,
}

/// Outcome of one batch.
#[derive(Debug, Clone, Copy)]
pub struct BatchReport {
    /// Samples in the batch
    pub received: usize,
    /// Samples successfully inserted
    pub inserted: usize,
    /// Samples dropped after insert failure
    pub failed: usize,
    /// Wall-clock time for the whole batch
    pub elapsed: Duration,
}

/// Coordinates admission-controlled fan-out of sample batches.
pub struct IngestionCoordinator {
    engine: Arc<dyn SketchEngine>,
    admission: Arc<AdmissionController>,
    stats: Arc<IngestionStats>,
    export: Arc<ExportMetrics>,
}

impl IngestionCoordinator {
    /// Create a coordinator.
    ///
    /// The admission controller must be the process-global one: sharing it
    /// across coordinators and request handlers is what makes the insert
    /// bound global rather than per-batch.
    pub fn new(
        engine: Arc<dyn SketchEngine>,
        admission: Arc<AdmissionController>,
        stats: Arc<IngestionStats>,
        export: Arc<ExportMetrics>,
    ) -> Self {
        Self {
            engine,
            admission,
            stats,
            export,
        }
    }

    /// The shared ingestion counters.
    pub fn stats(&self) -> &Arc<IngestionStats> {
        &self.stats
    }

    /// Ingest one batch, waiting for every sample to finish.
    ///
    /// Samples are dispatched in input order; each dispatch first acquires a
    /// global admission slot, so at most the configured number of inserts run
    /// concurrently across all batches. Completion order is unspecified.
    /// Failed inserts are logged and dropped, never retried.
    pub async fn ingest_batch(&self, timestamp: i64, metrics: Vec<MetricSample>) -> BatchReport {
        let start = Instant::now();
        let received = metrics.len();

        let mut tasks = JoinSet::new();
        for metric in metrics {
            // Acquiring before spawning keeps dispatch in input order and
            // suspends this loop once the global pool is exhausted.
            let permit = self.admission.acquire().await;
            let engine = Arc::clone(&self.engine);
            let stats = Arc::clone(&self.stats);
            let export = Arc::clone(&self.export);

            tasks.spawn(async move {
                let _permit = permit;

                // The sample is built from untrusted input here and consumed
                // by exactly one insert call.
                let sample = Sample::new(
                    SeriesKey::from_parts(&metric.name, &metric.labels),
                    timestamp,
                    metric.value,
                );
                debug!(series = %sample.key, timestamp, value = sample.value, "inserting sample");

                match engine
                    .insert(&sample.key, sample.timestamp, sample.value)
                    .await
                {
                    Ok(()) => {
                        stats.record_ingested();
                        let instance = sample.key.get(export.instance_label());
                        export.record_ingested(&metric.name, instance, sample.value);
                        true
                    }
                    Err(e) => {
                        warn!(series = %sample.key, error = %e, "insert failed, dropping sample");
                        stats.record_failure();
                        false
                    }
                }
            });
        }

        let mut inserted = 0;
        let mut failed = 0;
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(true) => inserted += 1,
                Ok(false) => failed += 1,
                Err(e) => {
                    warn!(error = %e, "sample task panicked");
                    self.stats.record_failure();
                    failed += 1;
                }
            }
        }

        self.stats.record_batch();
        let elapsed = start.elapsed();
        info!(
            batch_size = received,
            inserted,
            failed,
            elapsed_ms = elapsed.as_millis() as u64,
            "batch completed"
        );

        BatchReport {
            received,
            inserted,
            failed,
            elapsed,
        }
    }
}
