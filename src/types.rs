//! Core data types for the coordination layer
//!
//! # Key Types
//!
//! - **`SeriesKey`**: canonical, order-independent identity of a time-series
//!   (metric name plus label set)
//! - **`Sample`**: a single incoming measurement (series, timestamp, value)
//! - **`Coverage`**: the `[min, max]` timestamp range a sketch currently
//!   holds materialized data for
//!
//! # Example
//!
//! ```rust
//! use sketchd::types::SeriesKey;
//!
//! let a = SeriesKey::builder()
//!     .metric_name("cpu")
//!     .label("instance", "m0")
//!     .label("dc", "us-east")
//!     .build();
//!
//! let b = SeriesKey::builder()
//!     .label("dc", "us-east")
//!     .label("instance", "m0")
//!     .metric_name("cpu")
//!     .build();
//!
//! // Equality is independent of insertion order
//! assert_eq!(a, b);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Reserved label name carrying the metric name inside a label set.
pub const METRIC_NAME_LABEL: &str = "__name__";

/// Canonical identity of a time-series.
///
/// A `SeriesKey` is an immutable set of (label name, label value) pairs,
/// including the distinguished [`METRIC_NAME_LABEL`]. Two keys are equal iff
/// their pair-sets are equal; equality and hashing never depend on the order
/// labels were added in. Keys are used purely as lookup keys into per-series
/// state and are never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesKey {
    // Sorted by label name, names unique. Sorting at construction time is
    // what makes Eq/Hash insertion-order independent.
    labels: Vec<(String, String)>,
}

impl SeriesKey {
    /// Start building a series key.
    pub fn builder() -> SeriesKeyBuilder {
        SeriesKeyBuilder::default()
    }

    /// Build a key from a metric name and a label map.
    ///
    /// This is the ingestion-boundary constructor: payload labels plus the
    /// metric name under [`METRIC_NAME_LABEL`].
    pub fn from_parts(metric: &str, labels: &HashMap<String, String>) -> Self {
        let mut builder = Self::builder();
        for (name, value) in labels {
            builder = builder.label(name.clone(), value.clone());
        }
        builder.metric_name(metric).build()
    }

    /// Get a label value by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.labels
            .binary_search_by(|(n, _)| n.as_str().cmp(name))
            .ok()
            .map(|i| self.labels[i].1.as_str())
    }

    /// The metric name, if the key carries one.
    pub fn metric_name(&self) -> Option<&str> {
        self.get(METRIC_NAME_LABEL)
    }

    /// Iterate over all (name, value) pairs in sorted name order.
    pub fn labels(&self) -> impl Iterator<Item = (&str, &str)> {
        self.labels.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Number of labels, including the metric-name label.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// True if the key has no labels at all.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.metric_name().unwrap_or(""))?;
        write!(f, "{{")?;
        let mut first = true;
        for (name, value) in &self.labels {
            if name == METRIC_NAME_LABEL {
                continue;
            }
            if !first {
                write!(f, ",")?;
            }
            write!(f, "{}=\"{}\"", name, value)?;
            first = false;
        }
        write!(f, "}}")
    }
}

/// Builder for [`SeriesKey`].
///
/// Labels may be set in any order; setting the same name twice keeps the
/// last value.
#[derive(Debug, Default)]
pub struct SeriesKeyBuilder {
    labels: BTreeMap<String, String>,
}

impl SeriesKeyBuilder {
    /// Set a label.
    pub fn label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(name.into(), value.into());
        self
    }

    /// Set the metric name (stored under [`METRIC_NAME_LABEL`]).
    pub fn metric_name(self, name: impl Into<String>) -> Self {
        self.label(METRIC_NAME_LABEL, name)
    }

    /// Finish building. The resulting key is sorted and immutable.
    pub fn build(self) -> SeriesKey {
        SeriesKey {
            labels: self.labels.into_iter().collect(),
        }
    }
}

/// A single incoming measurement.
///
/// Constructed at the ingestion boundary from untrusted input, consumed
/// exactly once by a single sketch insert, then discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Identity of the series this sample belongs to
    pub key: SeriesKey,
    /// Unix timestamp in milliseconds since epoch
    pub timestamp: i64,
    /// Measurement value
    pub value: f64,
}

impl Sample {
    /// Create a new sample.
    pub fn new(key: SeriesKey, timestamp: i64, value: f64) -> Self {
        Self {
            key,
            timestamp,
            value,
        }
    }
}

/// Covered timestamp range of a materialized sketch, inclusive on both ends.
///
/// The sketch engine owns all writes to coverage; the coordinator only reads
/// it. "No sketch exists yet" is represented as `Option<Coverage>::None` at
/// the engine boundary rather than with an in-band sentinel value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    /// Oldest covered timestamp in milliseconds (inclusive)
    pub min: i64,
    /// Newest covered timestamp in milliseconds (inclusive)
    pub max: i64,
}

impl Coverage {
    /// Create a coverage range. Callers are expected to uphold `min <= max`.
    pub fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    /// Width of the covered range in milliseconds.
    pub fn width_ms(&self) -> i64 {
        self.max.saturating_sub(self.min)
    }

    /// Check whether a timestamp falls inside the covered range.
    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.min && timestamp <= self.max
    }
}
