use crate::models::{DbEvent, DbPendingDelivery, DbUser, NewEvent, NewPendingDelivery, NewUser};
use chrono::{DateTime, Utc};
use diesel::dsl::{exists, not};
use diesel::{PgConnection, prelude::*};

pub fn upsert_user(
    conn: &mut PgConnection,
    uuid: &str,
    name: &str,
    domain: &str,
) -> QueryResult<i64> {
    use crate::schema::users::dsl;

    NewUser { uuid, name, domain }
        .insert_into(dsl::users)
        .on_conflict(dsl::uuid)
        .do_update()
        .set((dsl::name.eq(name), dsl::domain.eq(domain)))
        .returning(dsl::id)
        .get_result(conn)
}

pub fn find_user_by_uuid(conn: &mut PgConnection, user_uuid: &str) -> QueryResult<Option<DbUser>> {
    use crate::schema::users::dsl;

    dsl::users
        .filter(dsl::uuid.eq(user_uuid))
        .select(DbUser::as_select())
        .get_result(conn)
        .optional()
}

pub fn find_event(conn: &mut PgConnection, event_id: i64) -> QueryResult<Option<DbEvent>> {
    use crate::schema::events::dsl;

    dsl::events
        .find(event_id)
        .select(DbEvent::as_select())
        .get_result(conn)
        .optional()
}

/// One full ingestion: caller identity, the validated event, and the target
/// types to fan out to.
pub struct EventIngest<'a> {
    pub creator_uuid: &'a str,
    pub creator_name: &'a str,
    pub creator_domain: &'a str,
    pub payload_type: &'a str,
    pub payload: &'a [u8],
    pub description: &'a str,
    pub routing_info_json: &'a str,
    pub target_types: &'a [&'a str],
    pub at: DateTime<Utc>,
}

/// Persists one event and its entire fan-out in a single transaction: the
/// producer sees either full acceptance or none. Every pending delivery
/// becomes eligible for both stages immediately (`next_*_at` = request time);
/// the conversion stage's `converted_at IS NULL` predicate is what actually
/// sequences the stages.
pub fn ingest_event(conn: &mut PgConnection, ingest: &EventIngest) -> QueryResult<i64> {
    use crate::schema::{events, pending_deliveries};

    conn.transaction(|conn| {
        let creator_id = upsert_user(
            conn,
            ingest.creator_uuid,
            ingest.creator_name,
            ingest.creator_domain,
        )?;

        let event_id = NewEvent {
            creator_id,
            created_at: ingest.at.naive_utc(),
            payload_type: ingest.payload_type,
            payload: ingest.payload,
            description: ingest.description,
            routing_info_json: ingest.routing_info_json,
        }
        .insert_into(events::table)
        .returning(events::id)
        .get_result(conn)?;

        let fan_out: Vec<_> = ingest
            .target_types
            .iter()
            .map(|target_type| NewPendingDelivery {
                event_id,
                payload_type: target_type,
                next_conversion_at: ingest.at.naive_utc(),
                next_delivery_at: ingest.at.naive_utc(),
            })
            .collect();
        diesel::insert_into(pending_deliveries::table)
            .values(&fan_out)
            .execute(conn)?;

        Ok(event_id)
    })
}

/// Claims the single oldest pending delivery that still needs conversion.
/// `FOR UPDATE SKIP LOCKED` makes concurrent claimers pick disjoint rows; the
/// claim is held until the surrounding transaction ends. The payload type is
/// a tie-breaker so equal timestamps drain in a stable order.
pub fn claim_conversion_candidate(
    conn: &mut PgConnection,
    now: DateTime<Utc>,
) -> QueryResult<Option<DbPendingDelivery>> {
    use crate::schema::pending_deliveries::dsl;

    dsl::pending_deliveries
        .filter(dsl::converted_at.is_null())
        .filter(dsl::next_conversion_at.le(now.naive_utc()))
        .select(DbPendingDelivery::as_select())
        .order((dsl::next_conversion_at.asc(), dsl::payload_type.asc()))
        .limit(1)
        .for_update()
        .skip_locked()
        .get_result(conn)
        .optional()
}

/// Claims the single oldest converted-but-undelivered row. Same locking
/// discipline as [`claim_conversion_candidate`].
pub fn claim_delivery_candidate(
    conn: &mut PgConnection,
    now: DateTime<Utc>,
) -> QueryResult<Option<DbPendingDelivery>> {
    use crate::schema::pending_deliveries::dsl;

    dsl::pending_deliveries
        .filter(dsl::converted_at.is_not_null())
        .filter(dsl::next_delivery_at.le(now.naive_utc()))
        .select(DbPendingDelivery::as_select())
        .order((dsl::next_delivery_at.asc(), dsl::payload_type.asc()))
        .limit(1)
        .for_update()
        .skip_locked()
        .get_result(conn)
        .optional()
}

pub fn store_converted_payload(
    conn: &mut PgConnection,
    event_id: i64,
    payload_type: &str,
    payload: &[u8],
    at: DateTime<Utc>,
) -> QueryResult<usize> {
    use crate::schema::pending_deliveries::dsl;

    diesel::update(dsl::pending_deliveries.find((event_id, payload_type)))
        .set((
            dsl::payload.eq(Some(payload)),
            dsl::converted_at.eq(Some(at.naive_utc())),
        ))
        .execute(conn)
}

pub fn record_conversion_failure(
    conn: &mut PgConnection,
    event_id: i64,
    payload_type: &str,
    next_attempt: DateTime<Utc>,
) -> QueryResult<usize> {
    use crate::schema::pending_deliveries::dsl;

    diesel::update(dsl::pending_deliveries.find((event_id, payload_type)))
        .set((
            dsl::failed_conversions.eq(dsl::failed_conversions + 1),
            dsl::next_conversion_at.eq(next_attempt.naive_utc()),
        ))
        .execute(conn)
}

pub fn record_delivery_failure(
    conn: &mut PgConnection,
    event_id: i64,
    payload_type: &str,
    next_attempt: DateTime<Utc>,
) -> QueryResult<usize> {
    use crate::schema::pending_deliveries::dsl;

    diesel::update(dsl::pending_deliveries.find((event_id, payload_type)))
        .set((
            dsl::failed_deliveries.eq(dsl::failed_deliveries + 1),
            dsl::next_delivery_at.eq(next_attempt.naive_utc()),
        ))
        .execute(conn)
}

pub fn delete_pending_delivery(
    conn: &mut PgConnection,
    event_id: i64,
    payload_type: &str,
) -> QueryResult<usize> {
    use crate::schema::pending_deliveries::dsl;

    diesel::delete(dsl::pending_deliveries.find((event_id, payload_type))).execute(conn)
}

pub fn find_pending_delivery(
    conn: &mut PgConnection,
    event_id: i64,
    payload_type: &str,
) -> QueryResult<Option<DbPendingDelivery>> {
    use crate::schema::pending_deliveries::dsl;

    dsl::pending_deliveries
        .find((event_id, payload_type))
        .select(DbPendingDelivery::as_select())
        .get_result(conn)
        .optional()
}

pub fn pending_deliveries_for_event(
    conn: &mut PgConnection,
    event_id: i64,
) -> QueryResult<Vec<DbPendingDelivery>> {
    use crate::schema::pending_deliveries::dsl;

    dsl::pending_deliveries
        .filter(dsl::event_id.eq(event_id))
        .select(DbPendingDelivery::as_select())
        .order(dsl::payload_type.asc())
        .get_results(conn)
}

/// Deletes every event that no pending delivery references anymore. The
/// foreign key keeps this from racing the workers: an event with a live
/// delivery can't match the predicate in the same snapshot.
pub fn delete_events_without_deliveries(conn: &mut PgConnection) -> QueryResult<usize> {
    use crate::schema::{events, pending_deliveries};

    diesel::delete(
        events::table.filter(not(exists(
            pending_deliveries::table.filter(pending_deliveries::event_id.eq(events::id)),
        ))),
    )
    .execute(conn)
}

/// Operator escape hatch for draining a stuck event by hand: removes the
/// event and whatever deliveries it still has, atomically.
pub fn purge_event(conn: &mut PgConnection, event_id: i64) -> QueryResult<usize> {
    use crate::schema::{events, pending_deliveries};

    conn.transaction(|conn| {
        diesel::delete(
            pending_deliveries::table.filter(pending_deliveries::event_id.eq(event_id)),
        )
        .execute(conn)?;
        diesel::delete(events::table.find(event_id)).execute(conn)
    })
}
