use chrono::NaiveDateTime;
use diesel::prelude::*;

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser<'a> {
    pub uuid: &'a str,
    pub name: &'a str,
    pub domain: &'a str,
}

#[derive(Debug, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbUser {
    pub id: i64,
    pub uuid: String,
    pub name: String,
    pub domain: String,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::events)]
pub struct NewEvent<'a> {
    pub creator_id: i64,
    pub created_at: NaiveDateTime,
    pub payload_type: &'a str,
    pub payload: &'a [u8],
    pub description: &'a str,
    pub routing_info_json: &'a str,
}

#[derive(Debug, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbEvent {
    pub id: i64,
    pub creator_id: i64,
    pub created_at: NaiveDateTime,
    pub payload_type: String,
    pub payload: Vec<u8>,
    pub description: String,
    pub routing_info_json: String,
}

/// Counters and the converted payload start out at their column defaults;
/// ingestion only decides the key and when the first attempts become due.
#[derive(Insertable)]
#[diesel(table_name = crate::schema::pending_deliveries)]
pub struct NewPendingDelivery<'a> {
    pub event_id: i64,
    pub payload_type: &'a str,
    pub next_conversion_at: NaiveDateTime,
    pub next_delivery_at: NaiveDateTime,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::pending_deliveries)]
#[diesel(primary_key(event_id, payload_type))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbPendingDelivery {
    pub event_id: i64,
    pub payload_type: String,
    pub payload: Option<Vec<u8>>,
    pub converted_at: Option<NaiveDateTime>,
    pub failed_conversions: i32,
    pub next_conversion_at: NaiveDateTime,
    pub failed_deliveries: i32,
    pub next_delivery_at: NaiveDateTime,
}
