//! Handlers for the `test-foo.v1` payload family. They are part of the
//! default registry so operators can push a synthetic event through a real
//! deployment and watch it come out the other end; the integration suite
//! drives the pipeline through them as well.

use crate::handler::{
    DeliveryHandler, DeliveryLog, HandlerResult, SKIP_PAYLOAD, TranslationHandler,
    ValidatedPayload, ValidationHandler,
};
use crate::registry::HandlerRegistry;
use crate::routing_info::RoutingInfo;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Deserialize, Serialize)]
struct TestPayload {
    event: String,
    value: i64,
}

pub struct TestValidator;

impl ValidationHandler for TestValidator {
    fn validate(&self, payload: &[u8]) -> HandlerResult<ValidatedPayload> {
        let parsed: TestPayload = serde_json::from_slice(payload)?;
        Ok(ValidatedPayload {
            description: format!("test event {:?} with value {}", parsed.event, parsed.value),
        })
    }
}

/// Rewrites the `event` field to the target's name. Returns the skip sentinel
/// when the producer set `skip=true` in the routing info.
pub struct TestTranslator {
    target_event: &'static str,
}

impl TranslationHandler for TestTranslator {
    fn translate(&self, payload: &[u8], routing_info: &RoutingInfo) -> HandlerResult<Vec<u8>> {
        let parsed: TestPayload = serde_json::from_slice(payload)?;
        if parsed.event != "foo" {
            return Err(format!("expected event = \"foo\", but got {:?}", parsed.event).into());
        }
        if routing_info.get("skip").is_some_and(|v| v == "true") {
            return Ok(SKIP_PAYLOAD.to_vec());
        }

        Ok(serde_json::to_vec(&TestPayload {
            event: self.target_event.to_string(),
            value: parsed.value,
        })?)
    }
}

/// "Delivers" by appending to a process-local sink that tests and operators
/// can inspect.
pub struct TestDeliverer {
    expected_event: &'static str,
}

impl DeliveryHandler for TestDeliverer {
    fn deliver(
        &self,
        payload: &[u8],
        _routing_info: &RoutingInfo,
        _cancel: &CancellationToken,
    ) -> HandlerResult<DeliveryLog> {
        if payload == SKIP_PAYLOAD {
            return Ok(DeliveryLog {
                message: Some("skipped by translator".to_string()),
            });
        }

        let parsed: TestPayload = serde_json::from_slice(payload)?;
        if parsed.event != self.expected_event {
            return Err(format!(
                "expected event = {:?}, but got {:?}",
                self.expected_event, parsed.event
            )
            .into());
        }

        let mut sink = DELIVERED.lock().expect("delivery sink mutex poisoned");
        sink.push(RecordedDelivery {
            target_event: parsed.event,
            payload: payload.to_vec(),
        });
        Ok(DeliveryLog {
            message: Some(format!("recorded {} delivery #{}", self.expected_event, sink.len())),
        })
    }
}

#[derive(Debug, Clone)]
pub struct RecordedDelivery {
    pub target_event: String,
    pub payload: Vec<u8>,
}

static DELIVERED: Mutex<Vec<RecordedDelivery>> = Mutex::new(Vec::new());

pub fn recorded_deliveries() -> Vec<RecordedDelivery> {
    DELIVERED.lock().expect("delivery sink mutex poisoned").clone()
}

pub fn clear_recorded_deliveries() {
    DELIVERED.lock().expect("delivery sink mutex poisoned").clear();
}

pub fn register(registry: &mut HandlerRegistry) {
    registry.register_validation("test-foo.v1", || Box::new(TestValidator));
    registry.register_translation("test-foo.v1->test-bar.v1", || {
        Box::new(TestTranslator { target_event: "bar" })
    });
    registry.register_translation("test-foo.v1->test-baz.v1", || {
        Box::new(TestTranslator { target_event: "baz" })
    });
    registry.register_delivery("test-bar.v1", || {
        Box::new(TestDeliverer { expected_event: "bar" })
    });
    registry.register_delivery("test-baz.v1", || {
        Box::new(TestDeliverer { expected_event: "baz" })
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    const FOO: &[u8] = br#"{"event":"foo","value":42}"#;

    #[test]
    fn validator_accepts_well_formed_payloads() {
        let validated = TestValidator.validate(FOO).unwrap();
        assert_eq!(validated.description, "test event \"foo\" with value 42");
    }

    #[test]
    fn validator_rejects_malformed_payloads() {
        assert!(TestValidator.validate(b"not json").is_err());
        assert!(TestValidator.validate(br#"{"event":"foo"}"#).is_err());
    }

    #[test]
    fn translator_rewrites_the_event_field() {
        let translator = TestTranslator { target_event: "bar" };
        let out = translator.translate(FOO, &RoutingInfo::new()).unwrap();
        assert_eq!(out, br#"{"event":"bar","value":42}"#);
    }

    #[test]
    fn translator_reports_unexpected_events_verbatim() {
        let translator = TestTranslator { target_event: "bar" };
        let err = translator
            .translate(br#"{"event":"invalid","value":42}"#, &RoutingInfo::new())
            .unwrap_err();
        assert_eq!(err.to_string(), r#"expected event = "foo", but got "invalid""#);
    }

    #[test]
    fn translator_emits_the_skip_sentinel_on_request() {
        let translator = TestTranslator { target_event: "bar" };
        let mut info = RoutingInfo::new();
        info.insert("skip".to_string(), "true".to_string());
        assert_eq!(translator.translate(FOO, &info).unwrap(), SKIP_PAYLOAD);
    }

    #[test]
    fn deliverer_records_payloads_and_honors_the_sentinel() {
        clear_recorded_deliveries();
        let deliverer = TestDeliverer { expected_event: "bar" };
        let cancel = CancellationToken::new();

        let log = deliverer
            .deliver(br#"{"event":"bar","value":42}"#, &RoutingInfo::new(), &cancel)
            .unwrap();
        assert!(log.message.is_some());
        assert_eq!(recorded_deliveries().len(), 1);

        deliverer
            .deliver(SKIP_PAYLOAD, &RoutingInfo::new(), &cancel)
            .unwrap();
        assert_eq!(recorded_deliveries().len(), 1, "skip must not deliver");

        assert!(
            deliverer
                .deliver(br#"{"event":"baz","value":1}"#, &RoutingInfo::new(), &cancel)
                .is_err()
        );
    }
}
