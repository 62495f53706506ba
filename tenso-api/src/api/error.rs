use crate::auth::AuthError;
use log::error;
use miette::Diagnostic;
use rocket::http::Status;
use rocket::response::Responder;
use rocket::{Request, Response};
use tenso_core::RoutingInfoError;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ApiError {
    #[error("the payload_type query parameter is required")]
    MissingPayloadType,

    #[error("the payload_type query parameter may only be given once")]
    RepeatedPayloadType,

    #[error("payload type {0:?} contains characters outside [A-Za-z0-9.-]")]
    MalformedPayloadType(String),

    #[error("no route is configured for payload type {0:?}")]
    UnroutedPayloadType(String),

    #[error("no synthetic payload exists for payload type {0:?}")]
    NoSyntheticPayload(String),

    #[error("the payload exceeds 10 MiB")]
    PayloadTooLarge,

    #[error("could not read the request payload")]
    UnreadablePayload(#[source] std::io::Error),

    #[error("payload validation failed: {0}")]
    InvalidPayload(String),

    #[error(transparent)]
    InvalidRoutingInfo(#[from] RoutingInfoError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    DbError(#[from] diesel::result::Error),
}

impl ApiError {
    fn status(&self) -> Status {
        match self {
            ApiError::MissingPayloadType
            | ApiError::RepeatedPayloadType
            | ApiError::MalformedPayloadType(_)
            | ApiError::UnroutedPayloadType(_)
            | ApiError::NoSyntheticPayload(_)
            | ApiError::UnreadablePayload(_)
            | ApiError::InvalidRoutingInfo(_) => Status::BadRequest,
            ApiError::PayloadTooLarge => Status::PayloadTooLarge,
            ApiError::InvalidPayload(_) => Status::UnprocessableEntity,
            ApiError::Auth(AuthError::Unauthenticated) => Status::Unauthorized,
            ApiError::Auth(AuthError::Forbidden(_)) => Status::Forbidden,
            ApiError::DbError(_) => Status::InternalServerError,
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for ApiError {
    fn respond_to(self, _: &'r Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        if status == Status::InternalServerError {
            error!("{:#?}", self);
        }

        let rendered = self.to_string();
        Response::build()
            .status(status)
            .header(rocket::http::ContentType::Text)
            .sized_body(rendered.len(), std::io::Cursor::new(rendered))
            .ok()
    }
}
