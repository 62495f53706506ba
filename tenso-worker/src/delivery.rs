use crate::observe::PipelineCounters;
use crate::{WorkerError, retry_backoff};
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tenso_core::{Clock, DeliveryLog, RouteSet, decode_routing_info};
use tenso_db::models::{DbEvent, DbPendingDelivery};
use tenso_db::pool::ConnectionPool;
use tenso_db::{Connection, PgConnection, db};
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub enum DeliveryOutcome {
    Idle,
    Delivered {
        event_id: i64,
        payload_type: String,
        note: Option<String>,
    },
    Failed {
        event_id: i64,
        payload_type: String,
        error: String,
    },
}

/// One delivery attempt in one transaction. The sink-side effect happens
/// before the row delete commits, so a crash in between replays the payload:
/// at-least-once, never silent drop.
pub fn deliver_one(
    conn: &mut PgConnection,
    routes: &RouteSet,
    now: DateTime<Utc>,
    cancel: &CancellationToken,
) -> Result<DeliveryOutcome, diesel::result::Error> {
    conn.transaction(|conn| {
        let Some(pending) = db::claim_delivery_candidate(conn, now)? else {
            return Ok(DeliveryOutcome::Idle);
        };

        let event = db::find_event(conn, pending.event_id)?;
        let delivered = match (&event, &pending.payload) {
            (Some(event), Some(payload)) => deliver(routes, event, &pending, payload, cancel),
            (None, _) => Err(format!("event {} is missing", pending.event_id)),
            (_, None) => Err("converted payload is missing".to_string()),
        };

        match delivered {
            Ok(delivery_log) => {
                db::delete_pending_delivery(conn, pending.event_id, &pending.payload_type)?;
                Ok(DeliveryOutcome::Delivered {
                    event_id: pending.event_id,
                    payload_type: pending.payload_type,
                    note: delivery_log.message,
                })
            }
            Err(error) => {
                db::record_delivery_failure(
                    conn,
                    pending.event_id,
                    &pending.payload_type,
                    now + retry_backoff(),
                )?;
                Ok(DeliveryOutcome::Failed {
                    event_id: pending.event_id,
                    payload_type: pending.payload_type,
                    error,
                })
            }
        }
    })
}

fn deliver(
    routes: &RouteSet,
    event: &DbEvent,
    pending: &DbPendingDelivery,
    payload: &[u8],
    cancel: &CancellationToken,
) -> Result<DeliveryLog, String> {
    let routing_info = decode_routing_info(&event.routing_info_json)
        .map_err(|err| format!("stored routing info is unreadable: {err}"))?;

    let deliverer = routes.deliverer_for(&pending.payload_type).ok_or_else(|| {
        format!("no route delivers payload type {}", pending.payload_type)
    })?;

    deliverer
        .deliver(payload, &routing_info, cancel)
        .map_err(|err| err.to_string())
}

pub fn run_delivery_worker(
    worker_id: usize,
    pool: ConnectionPool,
    routes: Arc<RouteSet>,
    clock: Clock,
    poll_interval: Duration,
    cancel: CancellationToken,
    counters: Arc<PipelineCounters>,
) {
    info!("Delivery worker {worker_id} started");

    while !cancel.is_cancelled() {
        match tick(&pool, &routes, &clock, &cancel) {
            Ok(DeliveryOutcome::Idle) => std::thread::sleep(poll_interval),
            Ok(DeliveryOutcome::Delivered {
                event_id,
                payload_type,
                note,
            }) => {
                counters.deliveries_succeeded.fetch_add(1, Ordering::Relaxed);
                match note {
                    Some(note) => info!(
                        "Delivered event {event_id} as {payload_type} on worker {worker_id}: \
                        {note}"
                    ),
                    None => {
                        info!("Delivered event {event_id} as {payload_type} on worker {worker_id}")
                    }
                }
            }
            Ok(DeliveryOutcome::Failed {
                event_id,
                payload_type,
                error,
            }) => {
                counters.deliveries_failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "Delivery of event {event_id} as {payload_type} failed on worker \
                    {worker_id}: {error}"
                );
            }
            Err(err) => {
                error!("Delivery worker {worker_id} iteration failed: {err}");
                std::thread::sleep(poll_interval);
            }
        }
    }

    info!("Delivery worker {worker_id} exiting");
}

fn tick(
    pool: &ConnectionPool,
    routes: &RouteSet,
    clock: &Clock,
    cancel: &CancellationToken,
) -> Result<DeliveryOutcome, WorkerError> {
    let mut conn = pool.get()?;
    Ok(deliver_one(&mut conn, routes, clock.now(), cancel)?)
}
