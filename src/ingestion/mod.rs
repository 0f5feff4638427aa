//! Ingestion pipeline for sketch-backed sample admission
//!
//! # Architecture
//!
//! ```text
//! [Batch] → [Admission Controller] → [per-sample tasks] → [Sketch Engine]
//!                    ↓                       ↓
//!             [global slot pool]     [Stats + Export Gauges]
//! ```
//!
//! # Components
//!
//! - **Admission**: process-global bounded-concurrency gate for inserts
//! - **Coordinator**: batch fan-out, per-sample isolation, counter updates
//! - **Stats**: lock-free atomic counters shared with the throughput monitor
//!
//! The admission bound is global: at most N samples are being inserted
//! simultaneously across the whole process, no matter how many batches are
//! in flight concurrently.

pub mod admission;
pub mod coordinator;
pub mod metrics;

pub use admission::{AdmissionController, AdmissionPermit};
pub use coordinator::{BatchReport, IngestionCoordinator, MetricSample};
pub use metrics::{IngestionStats, IngestionStatsSnapshot};
