use crate::observe::PipelineCounters;
use crate::{WorkerError, retry_backoff};
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tenso_core::{Clock, RouteSet, decode_routing_info};
use tenso_db::models::{DbEvent, DbPendingDelivery};
use tenso_db::pool::ConnectionPool;
use tenso_db::{Connection, PgConnection, db};
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub enum ConversionOutcome {
    /// No eligible row right now.
    Idle,
    Converted {
        event_id: i64,
        payload_type: String,
    },
    Failed {
        event_id: i64,
        payload_type: String,
        error: String,
    },
}

/// One conversion attempt in one transaction: claim the oldest eligible row,
/// translate, and either store the converted payload or push the row's next
/// attempt out by the retry backoff. Handler failures are data, not errors;
/// both paths commit so the row's state always advances.
pub fn convert_one(
    conn: &mut PgConnection,
    routes: &RouteSet,
    now: DateTime<Utc>,
) -> Result<ConversionOutcome, diesel::result::Error> {
    conn.transaction(|conn| {
        let Some(pending) = db::claim_conversion_candidate(conn, now)? else {
            return Ok(ConversionOutcome::Idle);
        };

        let event = db::find_event(conn, pending.event_id)?;
        let translated = match &event {
            Some(event) => translate(routes, event, &pending),
            None => Err(format!("event {} is missing", pending.event_id)),
        };

        match translated {
            Ok(payload) => {
                db::store_converted_payload(
                    conn,
                    pending.event_id,
                    &pending.payload_type,
                    &payload,
                    now,
                )?;
                Ok(ConversionOutcome::Converted {
                    event_id: pending.event_id,
                    payload_type: pending.payload_type,
                })
            }
            Err(error) => {
                db::record_conversion_failure(
                    conn,
                    pending.event_id,
                    &pending.payload_type,
                    now + retry_backoff(),
                )?;
                Ok(ConversionOutcome::Failed {
                    event_id: pending.event_id,
                    payload_type: pending.payload_type,
                    error,
                })
            }
        }
    })
}

fn translate(
    routes: &RouteSet,
    event: &DbEvent,
    pending: &DbPendingDelivery,
) -> Result<Vec<u8>, String> {
    let routing_info = decode_routing_info(&event.routing_info_json)
        .map_err(|err| format!("stored routing info is unreadable: {err}"))?;

    // A missing route means the configuration changed after the event was
    // ingested. The row keeps its normal backoff so restoring the route
    // resumes it; the growing failure counter is what operators watch.
    let translator = routes
        .translator_for(&event.payload_type, &pending.payload_type)
        .ok_or_else(|| {
            format!(
                "no route from {} to {} is configured",
                event.payload_type, pending.payload_type
            )
        })?;

    translator
        .translate(&event.payload, &routing_info)
        .map_err(|err| err.to_string())
}

pub fn run_conversion_worker(
    worker_id: usize,
    pool: ConnectionPool,
    routes: Arc<RouteSet>,
    clock: Clock,
    poll_interval: Duration,
    cancel: CancellationToken,
    counters: Arc<PipelineCounters>,
) {
    info!("Conversion worker {worker_id} started");

    while !cancel.is_cancelled() {
        match tick(&pool, &routes, &clock) {
            Ok(ConversionOutcome::Idle) => std::thread::sleep(poll_interval),
            Ok(ConversionOutcome::Converted {
                event_id,
                payload_type,
            }) => {
                counters.conversions_succeeded.fetch_add(1, Ordering::Relaxed);
                info!("Converted event {event_id} to {payload_type} on worker {worker_id}");
            }
            Ok(ConversionOutcome::Failed {
                event_id,
                payload_type,
                error,
            }) => {
                counters.conversions_failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "Conversion of event {event_id} to {payload_type} failed on worker \
                    {worker_id}: {error}"
                );
            }
            Err(err) => {
                error!("Conversion worker {worker_id} iteration failed: {err}");
                std::thread::sleep(poll_interval);
            }
        }
    }

    info!("Conversion worker {worker_id} exiting");
}

fn tick(
    pool: &ConnectionPool,
    routes: &RouteSet,
    clock: &Clock,
) -> Result<ConversionOutcome, WorkerError> {
    let mut conn = pool.get()?;
    Ok(convert_one(&mut conn, routes, clock.now())?)
}
