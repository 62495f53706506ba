mod error;
mod events;

#[rocket::get("/")]
pub async fn index() -> &'static str {
    "This is the tenso event intake. POST /v1/events/new?payload_type=... to ingest."
}

pub fn routes() -> Vec<rocket::Route> {
    rocket::routes![events::create_event, events::create_synthetic_event]
}
