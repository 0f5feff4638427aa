//! Ingestion counters
//!
//! Lock-free atomic counters shared between the ingestion coordinator (which
//! writes them) and the throughput monitor (which samples them). Explicitly
//! owned shared state: constructed once at startup and injected, never a
//! package-level global.

use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide ingestion tally.
pub struct IngestionStats {
    /// Samples successfully inserted into the engine
    ingested_total: AtomicU64,
    /// Samples whose insert failed and was dropped
    insert_failures: AtomicU64,
    /// Batches fully processed
    batches_processed: AtomicU64,
}

impl IngestionStats {
    /// Create a zeroed counter set.
    pub fn new() -> Self {
        Self {
            ingested_total: AtomicU64::new(0),
            insert_failures: AtomicU64::new(0),
            batches_processed: AtomicU64::new(0),
        }
    }

    /// Record one successful insert.
    #[inline]
    pub fn record_ingested(&self) {
        self.ingested_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one dropped insert.
    #[inline]
    pub fn record_failure(&self) {
        self.insert_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one completed batch.
    #[inline]
    pub fn record_batch(&self) {
        self.batches_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Monotonic count of successfully ingested samples.
    pub fn ingested_total(&self) -> u64 {
        self.ingested_total.load(Ordering::Relaxed)
    }

    /// Consistent-enough snapshot of all counters.
    pub fn snapshot(&self) -> IngestionStatsSnapshot {
        IngestionStatsSnapshot {
            ingested_total: self.ingested_total.load(Ordering::Relaxed),
            insert_failures: self.insert_failures.load(Ordering::Relaxed),
            batches_processed: self.batches_processed.load(Ordering::Relaxed),
        }
    }
}

impl Default for IngestionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of [`IngestionStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestionStatsSnapshot {
    /// Samples successfully inserted
    pub ingested_total: u64,
    /// Samples dropped after insert failure
    pub insert_failures: u64,
    /// Batches fully processed
    pub batches_processed: u64,
}
