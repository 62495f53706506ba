//! Handlers for the `release-note.v1` payload family: release announcements
//! coming out of a deployment pipeline, pushed to a JSON webhook sink. The
//! sink URL is deployment configuration, consumed once during `init`.

use crate::handler::{
    DeliveryHandler, DeliveryLog, HandlerResult, SKIP_PAYLOAD, TranslationHandler,
    ValidatedPayload, ValidationHandler,
};
use crate::registry::HandlerRegistry;
use crate::routing_info::RoutingInfo;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Deserialize)]
struct ReleaseNote {
    pipeline: String,
    version: String,
    summary: String,
}

#[derive(Debug, Serialize)]
struct WebhookMessage<'a> {
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<&'a str>,
}

pub struct ReleaseNoteValidator;

impl ValidationHandler for ReleaseNoteValidator {
    fn validate(&self, payload: &[u8]) -> HandlerResult<ValidatedPayload> {
        let note: ReleaseNote = serde_json::from_slice(payload)?;
        Ok(ValidatedPayload {
            description: format!("release {} from pipeline {}", note.version, note.pipeline),
        })
    }
}

/// Formats a release note as a webhook message. The producer may pick a
/// `channel` through routing info, or suppress delivery entirely with
/// `suppress=true`.
pub struct ReleaseNoteWebhookTranslator;

impl TranslationHandler for ReleaseNoteWebhookTranslator {
    fn translate(&self, payload: &[u8], routing_info: &RoutingInfo) -> HandlerResult<Vec<u8>> {
        let note: ReleaseNote = serde_json::from_slice(payload)?;
        if routing_info.get("suppress").is_some_and(|v| v == "true") {
            return Ok(SKIP_PAYLOAD.to_vec());
        }

        Ok(serde_json::to_vec(&WebhookMessage {
            text: format!("{} {} released: {}", note.pipeline, note.version, note.summary),
            channel: routing_info.get("channel").map(String::as_str),
        })?)
    }
}

pub struct WebhookDeliverer {
    url: Option<String>,
    client: Option<reqwest::blocking::Client>,
}

impl WebhookDeliverer {
    pub fn new() -> Self {
        Self { url: None, client: None }
    }
}

impl DeliveryHandler for WebhookDeliverer {
    fn init(&mut self) -> HandlerResult<()> {
        let url = std::env::var("TENSO_WEBHOOK_URL")
            .map_err(|_| "TENSO_WEBHOOK_URL must be set when a webhook route is configured")?;
        self.client = Some(
            reqwest::blocking::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()?,
        );
        self.url = Some(url);
        Ok(())
    }

    fn deliver(
        &self,
        payload: &[u8],
        _routing_info: &RoutingInfo,
        _cancel: &CancellationToken,
    ) -> HandlerResult<DeliveryLog> {
        if payload == SKIP_PAYLOAD {
            return Ok(DeliveryLog {
                message: Some("suppressed by translator".to_string()),
            });
        }

        let (Some(client), Some(url)) = (&self.client, &self.url) else {
            return Err("webhook deliverer was not initialized".into());
        };

        let response = client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload.to_vec())
            .send()?
            .error_for_status()?;

        Ok(DeliveryLog {
            message: Some(format!("webhook accepted with status {}", response.status())),
        })
    }
}

pub fn register(registry: &mut HandlerRegistry) {
    registry.register_validation("release-note.v1", || Box::new(ReleaseNoteValidator));
    registry.register_translation("release-note.v1->release-note-webhook.v1", || {
        Box::new(ReleaseNoteWebhookTranslator)
    });
    registry.register_delivery("release-note-webhook.v1", || Box::new(WebhookDeliverer::new()));
}
