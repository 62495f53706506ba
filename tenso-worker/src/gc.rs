use crate::WorkerError;
use crate::observe::PipelineCounters;
use log::{error, info};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tenso_db::db;
use tenso_db::pool::ConnectionPool;
use tokio_util::sync::CancellationToken;

/// Periodically removes events that have no pending delivery left. One SQL
/// statement, no locking; the foreign key keeps live events out of reach.
pub async fn run_garbage_collector(
    pool: ConnectionPool,
    interval: Duration,
    cancel: CancellationToken,
    counters: Arc<PipelineCounters>,
) {
    info!("Garbage collector started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }

        let pool = pool.clone();
        let result = tokio::task::spawn_blocking(move || -> Result<usize, WorkerError> {
            let mut conn = pool.get()?;
            Ok(db::delete_events_without_deliveries(&mut conn)?)
        })
        .await;

        match result {
            Ok(Ok(0)) => {}
            Ok(Ok(deleted)) => {
                counters.events_collected.fetch_add(deleted as u64, Ordering::Relaxed);
                info!("Garbage-collected {deleted} fully delivered events");
                counters.log_summary();
            }
            Ok(Err(err)) => error!("Garbage collection failed: {err}"),
            Err(err) => error!("Garbage collection task panicked: {err}"),
        }
    }

    info!("Garbage collector exiting");
}
