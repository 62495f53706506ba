use log::info;
use std::sync::atomic::{AtomicU64, Ordering};

/// Terminal-outcome counters for the whole worker process, logged after every
/// garbage-collection pass and once more on shutdown. The durable view of the
/// same failures lives on the rows themselves as `failed_*` counters.
#[derive(Debug, Default)]
pub struct PipelineCounters {
    pub conversions_succeeded: AtomicU64,
    pub conversions_failed: AtomicU64,
    pub deliveries_succeeded: AtomicU64,
    pub deliveries_failed: AtomicU64,
    pub events_collected: AtomicU64,
}

impl PipelineCounters {
    pub fn log_summary(&self) {
        info!(
            "Pipeline totals: {} conversions succeeded and {} failed, \
            {} deliveries succeeded and {} failed, {} events garbage-collected",
            self.conversions_succeeded.load(Ordering::Relaxed),
            self.conversions_failed.load(Ordering::Relaxed),
            self.deliveries_succeeded.load(Ordering::Relaxed),
            self.deliveries_failed.load(Ordering::Relaxed),
            self.events_collected.load(Ordering::Relaxed),
        );
    }
}
