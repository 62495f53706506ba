use crate::Db;
use crate::api::error::ApiError;
use crate::auth::{CallerIdentity, TokenValidator};
use chrono::{DateTime, Utc};
use rocket::data::{Data, ToByteUnit};
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::{Request, State, post};
use std::sync::Arc;
use tenso_core::{
    Clock, RouteSet, ValidationHandler, encode_routing_info, is_well_formed_payload_type,
    parse_routing_info, synthetic_payload,
};
use tenso_db::db::EventIngest;

/// Raw `X-Auth-Token` header value; judging it is the token validator's job,
/// and that happens inside the handler so the checks run in a fixed order.
pub struct XAuthToken(Option<String>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for XAuthToken {
    type Error = std::convert::Infallible;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(XAuthToken(
            req.headers().get_one("X-Auth-Token").map(str::to_string),
        ))
    }
}

/// Raw `X-Tenso-Routing-Info` header value, parsed later in the flow.
pub struct RoutingInfoHeader(Option<String>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for RoutingInfoHeader {
    type Error = std::convert::Infallible;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(RoutingInfoHeader(
            req.headers().get_one("X-Tenso-Routing-Info").map(str::to_string),
        ))
    }
}

#[post("/new?<payload_type>", data = "<body>")]
pub async fn create_event(
    payload_type: Vec<String>,
    body: Data<'_>,
    token: XAuthToken,
    routing_header: RoutingInfoHeader,
    db: Db,
    routes: &State<Arc<RouteSet>>,
    token_validator: &State<Arc<dyn TokenValidator>>,
    clock: &State<Clock>,
) -> Result<Status, ApiError> {
    let payload_type = single_payload_type(&payload_type)?;
    let identity = token_validator.check_token(token.0.as_deref(), "event:create", &payload_type)?;
    let (targets, validator) = route_context(routes, &payload_type)?;

    let capped = body
        .open(10.mebibytes())
        .into_bytes()
        .await
        .map_err(ApiError::UnreadablePayload)?;
    if !capped.is_complete() {
        return Err(ApiError::PayloadTooLarge);
    }
    let payload = capped.into_inner();

    let description = validate_payload(&validator, &payload)?;
    let routing_info_json = routing_info_json(&routing_header)?;

    persist_event(
        db,
        identity,
        payload_type,
        payload,
        description,
        routing_info_json,
        targets,
        clock.now(),
    )
    .await
}

#[post("/synthetic?<payload_type>", data = "<_body>")]
pub async fn create_synthetic_event(
    payload_type: Vec<String>,
    _body: Data<'_>,
    token: XAuthToken,
    routing_header: RoutingInfoHeader,
    db: Db,
    routes: &State<Arc<RouteSet>>,
    token_validator: &State<Arc<dyn TokenValidator>>,
    clock: &State<Clock>,
) -> Result<Status, ApiError> {
    let payload_type = single_payload_type(&payload_type)?;
    let identity =
        token_validator.check_token(token.0.as_deref(), "event:create_synthetic", &payload_type)?;
    let (targets, validator) = route_context(routes, &payload_type)?;

    // The request body is ignored; the payload comes from the fixture table.
    let payload = synthetic_payload(&payload_type)
        .ok_or_else(|| ApiError::NoSyntheticPayload(payload_type.clone()))?
        .to_vec();

    let description = validate_payload(&validator, &payload)?;
    let routing_info_json = routing_info_json(&routing_header)?;

    persist_event(
        db,
        identity,
        payload_type,
        payload,
        description,
        routing_info_json,
        targets,
        clock.now(),
    )
    .await
}

fn single_payload_type(values: &[String]) -> Result<String, ApiError> {
    match values {
        [] => Err(ApiError::MissingPayloadType),
        [payload_type] => {
            if is_well_formed_payload_type(payload_type) {
                Ok(payload_type.clone())
            } else {
                Err(ApiError::MalformedPayloadType(payload_type.clone()))
            }
        }
        _ => Err(ApiError::RepeatedPayloadType),
    }
}

fn route_context(
    routes: &RouteSet,
    payload_type: &str,
) -> Result<(Vec<String>, Arc<dyn ValidationHandler>), ApiError> {
    // One validator instance serves every route with this source, so any
    // match will do.
    let Some(validator) = routes.validator_for_source(payload_type) else {
        return Err(ApiError::UnroutedPayloadType(payload_type.to_string()));
    };
    let targets = routes
        .targets_for_source(payload_type)
        .into_iter()
        .map(str::to_string)
        .collect();
    Ok((targets, validator.clone()))
}

fn validate_payload(
    validator: &Arc<dyn ValidationHandler>,
    payload: &[u8],
) -> Result<String, ApiError> {
    validator
        .validate(payload)
        .map(|validated| validated.description)
        .map_err(|err| ApiError::InvalidPayload(err.to_string()))
}

fn routing_info_json(header: &RoutingInfoHeader) -> Result<String, ApiError> {
    let info = match &header.0 {
        Some(raw) => parse_routing_info(raw)?,
        None => Default::default(),
    };
    Ok(encode_routing_info(&info))
}

#[allow(clippy::too_many_arguments)]
async fn persist_event(
    db: Db,
    identity: CallerIdentity,
    payload_type: String,
    payload: Vec<u8>,
    description: String,
    routing_info_json: String,
    targets: Vec<String>,
    at: DateTime<Utc>,
) -> Result<Status, ApiError> {
    db.run(move |conn| {
        let target_types: Vec<&str> = targets.iter().map(String::as_str).collect();
        tenso_db::db::ingest_event(
            conn,
            &EventIngest {
                creator_uuid: &identity.uuid,
                creator_name: &identity.name,
                creator_domain: &identity.domain,
                payload_type: &payload_type,
                payload: &payload,
                description: &description,
                routing_info_json: &routing_info_json,
                target_types: &target_types,
                at,
            },
        )?;
        Ok(Status::Accepted)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenso_core::{HandlerRegistry, build_routes};

    fn params(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn the_payload_type_parameter_must_appear_exactly_once() {
        assert!(matches!(
            single_payload_type(&params(&[])),
            Err(ApiError::MissingPayloadType)
        ));
        assert!(matches!(
            single_payload_type(&params(&["a.v1", "b.v1"])),
            Err(ApiError::RepeatedPayloadType)
        ));
        assert_eq!(single_payload_type(&params(&["a.v1"])).unwrap(), "a.v1");
    }

    #[test]
    fn malformed_payload_types_are_rejected() {
        assert!(matches!(
            single_payload_type(&params(&["has space"])),
            Err(ApiError::MalformedPayloadType(_))
        ));
        assert!(matches!(
            single_payload_type(&params(&[""])),
            Err(ApiError::MalformedPayloadType(_))
        ));
    }

    #[test]
    fn route_context_collects_all_targets_of_the_source() {
        let routes = build_routes(
            "test-foo.v1 -> test-bar.v1, test-foo.v1 -> test-baz.v1",
            &HandlerRegistry::builtin(),
        )
        .unwrap();

        let (targets, _) = route_context(&routes, "test-foo.v1").unwrap();
        assert_eq!(targets, ["test-bar.v1", "test-baz.v1"]);

        assert!(matches!(
            route_context(&routes, "unknown.v1"),
            Err(ApiError::UnroutedPayloadType(_))
        ));
    }

    #[test]
    fn routing_info_headers_end_up_as_json() {
        let json = routing_info_json(&RoutingInfoHeader(Some("b=2, a=1".to_string()))).unwrap();
        assert_eq!(json, r#"{"a":"1","b":"2"}"#);

        let json = routing_info_json(&RoutingInfoHeader(None)).unwrap();
        assert_eq!(json, "{}");

        assert!(routing_info_json(&RoutingInfoHeader(Some("broken".to_string()))).is_err());
    }
}
