//! Prometheus exposition metrics
//!
//! Gauges exported by the coordination layer, held in an explicitly owned
//! registry that is constructed at startup and injected wherever needed.

use prometheus::{Encoder, GaugeVec, IntCounter, Opts, Registry, TextEncoder};

/// Label value used when a sample or query carries no instance label.
const UNLABELED_INSTANCE: &str = "default";

/// Owned registry of the coordinator's exported metrics.
///
/// - `ingested_metrics`: last ingested value per (metric, instance)
/// - `query_results`: last evaluated value per (function, original metric,
///   instance, formatted numeric argument)
/// - `ingested_samples_total`: monotonic ingest counter for scraping
pub struct ExportMetrics {
    registry: Registry,
    ingested_metrics: GaugeVec,
    query_results: GaugeVec,
    ingested_samples_total: IntCounter,
    /// Label name that designates the reporting instance (e.g. "instance")
    instance_label: String,
}

impl ExportMetrics {
    /// Build a registry with all collectors registered.
    ///
    /// `instance_label` is the label name used to split gauges per reporting
    /// instance; samples without it fall into a shared "default" bucket.
    pub fn new(instance_label: impl Into<String>) -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let ingested_metrics = GaugeVec::new(
            Opts::new(
                "sketchd_ingested_metrics",
                "Last ingested value per metric and instance",
            ),
            &["metric", "instance"],
        )?;
        let query_results = GaugeVec::new(
            Opts::new(
                "sketchd_query_result",
                "Last evaluated query result per function, metric, instance and argument",
            ),
            &["function", "original_metric", "instance", "arg"],
        )?;
        let ingested_samples_total = IntCounter::new(
            "sketchd_ingested_samples_total",
            "Total number of successfully ingested samples",
        )?;

        registry.register(Box::new(ingested_metrics.clone()))?;
        registry.register(Box::new(query_results.clone()))?;
        registry.register(Box::new(ingested_samples_total.clone()))?;

        Ok(Self {
            registry,
            ingested_metrics,
            query_results,
            ingested_samples_total,
            instance_label: instance_label.into(),
        })
    }

    /// The label name designating the reporting instance.
    pub fn instance_label(&self) -> &str {
        &self.instance_label
    }

    /// Record a successfully ingested sample.
    pub fn record_ingested(&self, metric: &str, instance: Option<&str>, value: f64) {
        self.ingested_metrics
            .with_label_values(&[metric, instance.unwrap_or(UNLABELED_INSTANCE)])
            .set(value);
        self.ingested_samples_total.inc();
    }

    /// Record one evaluated query result point.
    pub fn record_query_result(
        &self,
        function: &str,
        metric: &str,
        instance: Option<&str>,
        arg: f64,
        value: f64,
    ) {
        self.query_results
            .with_label_values(&[
                function,
                metric,
                instance.unwrap_or(UNLABELED_INSTANCE),
                &format!("{:.2}", arg),
            ])
            .set(value);
    }

    /// Render the registry in Prometheus text exposition format.
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
