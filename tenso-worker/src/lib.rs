pub mod config;
pub mod conversion;
pub mod delivery;
pub mod gc;
pub mod observe;

use thiserror::Error;

/// Fixed additive backoff applied after every failed attempt at either stage.
/// Stored as an absolute `next_*_at` timestamp so it survives restarts; no
/// jitter and no exponential growth, persistent failures are a human concern
/// surfaced through the `failed_*` counters.
pub fn retry_backoff() -> chrono::Duration {
    chrono::Duration::minutes(2)
}

/// Failures of a worker iteration itself, as opposed to handler failures
/// (which stay on their row as counter + backoff). Logged at the loop
/// boundary and retried on the next poll; never fatal.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("couldn't get a connection from the pool")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error(transparent)]
    Query(#[from] diesel::result::Error),
}
