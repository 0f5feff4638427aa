//! Background services
//!
//! Long-running tasks that outlive individual requests. Services implement
//! [`Service`] and run until the process-wide shutdown signal fires.

pub mod throughput;

use std::time::Duration;
use tokio::sync::broadcast;

pub use throughput::{ThroughputMonitor, ThroughputMonitorConfig};

/// Trait for background services.
#[async_trait::async_trait]
pub trait Service: Send + Sync {
    /// Run the service until completion or shutdown.
    ///
    /// Implementations should select on the shutdown receiver and return
    /// promptly once it fires.
    async fn start(&self, shutdown: broadcast::Receiver<()>) -> Result<(), ServiceError>;

    /// Service name for logging and identification.
    fn name(&self) -> &'static str;
}

/// Errors that can occur in services
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Service failed during initialization
    #[error("Service initialization failed: {0}")]
    InitializationFailed(String),

    /// Service encountered an error during execution
    #[error("Service runtime error: {0}")]
    RuntimeError(String),
}

/// Spawn a service onto the runtime, logging its eventual outcome.
pub fn spawn_service(
    service: std::sync::Arc<dyn Service>,
    shutdown: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let name = service.name();
        tracing::info!(service = name, "service starting");
        match service.start(shutdown).await {
            Ok(()) => tracing::info!(service = name, "service stopped"),
            Err(e) => tracing::error!(service = name, error = %e, "service failed"),
        }
    })
}

/// Convenience guard: a broadcast shutdown channel shared by all services.
pub struct ShutdownSignal {
    tx: broadcast::Sender<()>,
}

impl ShutdownSignal {
    /// Create a new shutdown channel.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe a service to the signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Fire the signal. Safe to call with no live subscribers.
    pub fn shutdown(&self) {
        let _ = self.tx.send(());
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Sleep helper used by periodic services; kept here so intervals are
/// consistent across services.
pub(crate) fn interval_with_skip(period: Duration) -> tokio::time::Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    interval
}
