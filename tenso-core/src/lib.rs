mod clock;
mod handler;
pub mod handlers;
mod registry;
mod route;
mod routing_info;
mod synthetic;

pub use clock::Clock;
pub use handler::{
    DeliveryHandler, DeliveryLog, HandlerError, HandlerResult, SKIP_PAYLOAD, TranslationHandler,
    ValidatedPayload, ValidationHandler,
};
pub use registry::HandlerRegistry;
pub use route::{Route, RouteBuildError, RouteSet, build_routes, is_well_formed_payload_type};
pub use routing_info::{
    RoutingInfo, RoutingInfoError, decode_routing_info, encode_routing_info, parse_routing_info,
};
pub use synthetic::synthetic_payload;
