//! Admission control for the write path
//!
//! Caps the number of simultaneous sketch inserts system-wide. The gate is a
//! counting semaphore dressed up as an explicit resource pool so the slot
//! lifecycle (and the starvation risk of a stuck insert holding its slot
//! forever) stays visible and testable.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounded-concurrency gate for ingestion operations.
///
/// `acquire` suspends the caller until fewer than the configured maximum
/// number of operations hold a slot. Slots are returned when the
/// [`AdmissionPermit`] is dropped, on every exit path. The controller itself
/// never errors: it is a pure synchronization primitive.
///
/// There is no fairness guarantee beyond what the underlying semaphore
/// provides, and no per-slot timeout: a stuck insert starves the pool.
#[derive(Debug)]
pub struct AdmissionController {
    slots: Arc<Semaphore>,
    max_in_flight: usize,
}

impl AdmissionController {
    /// Create a controller with the given slot count.
    ///
    /// A zero bound would deadlock every writer, so it is clamped to 1.
    pub fn new(max_in_flight: usize) -> Self {
        let max_in_flight = max_in_flight.max(1);
        Self {
            slots: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
        }
    }

    /// Acquire an admission slot, suspending until one is free.
    pub async fn acquire(&self) -> AdmissionPermit {
        // The semaphore is never closed while the controller is alive, so
        // acquire_owned cannot fail here.
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .expect("admission semaphore closed");
        AdmissionPermit { _permit: permit }
    }

    /// The configured maximum number of concurrent operations.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Currently free slots, for instrumentation.
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }
}

/// A held admission slot.
///
/// Releasing is tied to `Drop`, so the slot is returned exactly once per
/// acquisition regardless of whether the guarded insert succeeds, fails, or
/// the task unwinds.
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
}
