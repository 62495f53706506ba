use crate::routing_info::RoutingInfo;
use tokio_util::sync::CancellationToken;

/// Errors coming out of handler plugins are opaque to the pipeline: every one
/// of them is treated as retriable and only ever surfaces in logs and in the
/// per-row failure counters.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type HandlerResult<T> = Result<T, HandlerError>;

/// A translation handler may return this sentinel instead of a real payload to
/// tell the delivery handler for the same target type to take no action. The
/// convention is opt-in per handler pair; handlers that don't know about it
/// never produce it.
pub const SKIP_PAYLOAD: &[u8] = b"skip";

pub struct ValidatedPayload {
    /// Short human description of the event, stored alongside it.
    pub description: String,
}

#[derive(Debug)]
pub struct DeliveryLog {
    /// Optional operator-facing note about the delivery, e.g. the id the sink
    /// assigned to the uploaded object.
    pub message: Option<String>,
}

/// Checks raw payloads of one source payload type. The handler's type id is
/// that payload type.
pub trait ValidationHandler: Send + Sync {
    /// Called exactly once per instance before the instance is shared between
    /// routes. Must be idempotent.
    fn init(&mut self) -> HandlerResult<()> {
        Ok(())
    }

    fn validate(&self, payload: &[u8]) -> HandlerResult<ValidatedPayload>;
}

/// Turns a source payload into one target payload. The handler's type id is
/// `"{source}->{target}"`. Must be pure: same payload and routing info, same
/// output.
pub trait TranslationHandler: Send + Sync {
    fn init(&mut self) -> HandlerResult<()> {
        Ok(())
    }

    fn translate(&self, payload: &[u8], routing_info: &RoutingInfo) -> HandlerResult<Vec<u8>>;
}

/// Pushes a converted payload into a downstream sink. The handler's type id is
/// the target payload type.
///
/// Delivery is at-least-once: a crash between the sink-side effect and the
/// database commit replays the payload. Implementations should be idempotent
/// where the sink allows it, and otherwise return a stable identifier in the
/// delivery log so operators can reconcile duplicates.
pub trait DeliveryHandler: Send + Sync {
    fn init(&mut self) -> HandlerResult<()> {
        Ok(())
    }

    fn deliver(
        &self,
        payload: &[u8],
        routing_info: &RoutingInfo,
        cancel: &CancellationToken,
    ) -> HandlerResult<DeliveryLog>;
}
