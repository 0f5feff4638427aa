//! Ingestion throughput monitoring
//!
//! Periodically samples the monotonic ingested-sample counter, derives an
//! instantaneous rate, and appends it to a durable CSV log for offline
//! analysis. The log survives restarts: the header row is written exactly
//! once, only when the file is empty, and later runs append below whatever
//! is already there.

use crate::ingestion::IngestionStats;
use crate::services::{interval_with_skip, Service, ServiceError};
use chrono::Utc;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// CSV header of the throughput log.
const LOG_HEADER: &str = "timestamp,samples_per_sec,total_samples\n";

/// Configuration for the throughput monitor.
#[derive(Debug, Clone)]
pub struct ThroughputMonitorConfig {
    /// Path of the append-only CSV log
    pub log_path: PathBuf,
    /// Sampling interval
    pub interval: Duration,
}

impl Default for ThroughputMonitorConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from("throughput_log.csv"),
            interval: Duration::from_secs(5),
        }
    }
}

/// Background sampler of the process-wide ingestion counter.
pub struct ThroughputMonitor {
    config: ThroughputMonitorConfig,
    stats: Arc<IngestionStats>,
    last_total: parking_lot::Mutex<u64>,
}

impl ThroughputMonitor {
    /// Create a monitor over the shared ingestion counters.
    pub fn new(config: ThroughputMonitorConfig, stats: Arc<IngestionStats>) -> Self {
        Self {
            config,
            stats,
            last_total: parking_lot::Mutex::new(0),
        }
    }

    /// Take one sample: compute the rate since the previous tick and append
    /// a CSV row. Split out from the run loop so tests can drive ticks
    /// without timers.
    pub fn sample_once(&self) -> Result<ThroughputSample, std::io::Error> {
        let current = self.stats.ingested_total();
        let mut last = self.last_total.lock();
        let delta = current.saturating_sub(*last);
        *last = current;
        drop(last);

        let rate = delta as f64 / self.config.interval.as_secs_f64();
        let sample = ThroughputSample {
            timestamp: Utc::now().to_rfc3339(),
            samples_per_sec: rate,
            total_samples: current,
        };

        self.append_row(&sample)?;
        info!(
            samples_per_sec = format!("{:.2}", rate),
            total = current,
            "ingestion rate"
        );
        Ok(sample)
    }

    fn append_row(&self, sample: &ThroughputSample) -> Result<(), std::io::Error> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.config.log_path)?;

        if file.metadata()?.len() == 0 {
            file.write_all(LOG_HEADER.as_bytes())?;
        }

        let row = format!(
            "{},{:.2},{}\n",
            sample.timestamp, sample.samples_per_sec, sample.total_samples
        );
        file.write_all(row.as_bytes())
    }
}

/// One recorded throughput observation.
#[derive(Debug, Clone)]
pub struct ThroughputSample {
    /// RFC 3339 timestamp of the observation
    pub timestamp: String,
    /// Instantaneous ingestion rate
    pub samples_per_sec: f64,
    /// Cumulative ingested-sample count at observation time
    pub total_samples: u64,
}

#[async_trait::async_trait]
impl Service for ThroughputMonitor {
    async fn start(&self, mut shutdown: broadcast::Receiver<()>) -> Result<(), ServiceError> {
        let mut ticker = interval_with_skip(self.config.interval);
        // The first tick of a tokio interval fires immediately; skip it so
        // the first logged rate covers a full interval.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sample_once() {
                        warn!(error = %e, path = ?self.config.log_path, "throughput log write failed");
                    }
                }
                _ = shutdown.recv() => {
                    return Ok(());
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "throughput-monitor"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn monitor_in(dir: &TempDir) -> (ThroughputMonitor, Arc<IngestionStats>) {
        let stats = Arc::new(IngestionStats::new());
        let monitor = ThroughputMonitor::new(
            ThroughputMonitorConfig {
                log_path: dir.path().join("throughput_log.csv"),
                interval: Duration::from_secs(5),
            },
            Arc::clone(&stats),
        );
        (monitor, stats)
    }

    #[test]
    fn test_header_written_once() {
        let dir = TempDir::new().unwrap();
        let (monitor, stats) = monitor_in(&dir);

        for _ in 0..10 {
            stats.record_ingested();
        }
        monitor.sample_once().unwrap();
        monitor.sample_once().unwrap();

        let contents = std::fs::read_to_string(dir.path().join("throughput_log.csv")).unwrap();
        let header_count = contents
            .lines()
            .filter(|l| *l == "timestamp,samples_per_sec,total_samples")
            .count();
        assert_eq!(header_count, 1);
        assert_eq!(contents.lines().count(), 3);
    }

    #[test]
    fn test_appends_to_existing_log() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("throughput_log.csv");
        std::fs::write(&path, "timestamp,samples_per_sec,total_samples\nold,1.00,5\n").unwrap();

        let (monitor, _stats) = monitor_in(&dir);
        monitor.sample_once().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("timestamp,samples_per_sec,total_samples\nold,1.00,5\n"));
        assert_eq!(contents.lines().count(), 3);
    }

    #[test]
    fn test_rate_computation() {
        let dir = TempDir::new().unwrap();
        let (monitor, stats) = monitor_in(&dir);

        for _ in 0..10 {
            stats.record_ingested();
        }
        let first = monitor.sample_once().unwrap();
        assert_eq!(first.samples_per_sec, 2.0); // 10 samples over 5 seconds
        assert_eq!(first.total_samples, 10);

        // No new samples: rate drops to zero, total stays.
        let second = monitor.sample_once().unwrap();
        assert_eq!(second.samples_per_sec, 0.0);
        assert_eq!(second.total_samples, 10);
    }

    #[tokio::test]
    async fn test_stops_on_shutdown() {
        let dir = TempDir::new().unwrap();
        let (monitor, _stats) = monitor_in(&dir);

        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(async move { monitor.start(rx).await });

        tx.send(()).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("monitor did not stop")
            .unwrap();
        assert!(result.is_ok());
    }
}
