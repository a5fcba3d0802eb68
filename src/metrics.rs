use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

/// Timing hooks invoked by the aggregation service around every aggregation and every broadcast.
///
/// Both hooks default to a no-op, the service doesn't depend on them to function.
pub trait Instrumentation: Send + Sync {
    /// Called after the aggregator produced a new model.
    fn on_aggregation(&self, _elapsed: Duration) {}

    /// Called after a model snapshot was written to one or all of the workers' channels.
    fn on_broadcast(&self, _elapsed: Duration) {}
}

/// Instrumentation that records nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoInstrumentation;

impl Instrumentation for NoInstrumentation {}

/// Accumulated timings of an aggregation service.
#[derive(Debug, Default)]
pub struct ServiceStats {
    aggregations: AtomicU64,
    aggregation_nanos: AtomicU64,
    broadcasts: AtomicU64,
    broadcast_nanos: AtomicU64,
}

impl ServiceStats {
    /// Creates a new `ServiceStats` with every counter in zero.
    ///
    /// # Returns
    /// A new `ServiceStats` instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn aggregations(&self) -> u64 {
        self.aggregations.load(Ordering::Relaxed)
    }

    pub fn aggregation_time(&self) -> Duration {
        Duration::from_nanos(self.aggregation_nanos.load(Ordering::Relaxed))
    }

    pub fn broadcasts(&self) -> u64 {
        self.broadcasts.load(Ordering::Relaxed)
    }

    pub fn broadcast_time(&self) -> Duration {
        Duration::from_nanos(self.broadcast_nanos.load(Ordering::Relaxed))
    }
}

impl Instrumentation for ServiceStats {
    fn on_aggregation(&self, elapsed: Duration) {
        self.aggregations.fetch_add(1, Ordering::Relaxed);
        self.aggregation_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    fn on_broadcast(&self, elapsed: Duration) {
        self.broadcasts.fetch_add(1, Ordering::Relaxed);
        self.broadcast_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }
}
