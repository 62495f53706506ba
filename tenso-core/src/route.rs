use crate::handler::{DeliveryHandler, HandlerError, TranslationHandler, ValidationHandler};
use crate::registry::HandlerRegistry;
use hashbrown::HashMap;
use miette::Diagnostic;
use std::sync::Arc;
use thiserror::Error;

/// Payload type ids are restricted to `[A-Za-z0-9.-]+`. The same check guards
/// route specs at startup and the `payload_type` query parameter at ingest.
pub fn is_well_formed_payload_type(payload_type: &str) -> bool {
    !payload_type.is_empty()
        && payload_type
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
}

/// One configured source-to-target binding. Handler instances are shared:
/// every route with the same source holds the same validator, every route
/// with the same target the same deliverer.
#[derive(Clone)]
pub struct Route {
    pub source_type: String,
    pub target_type: String,
    pub validator: Arc<dyn ValidationHandler>,
    pub translator: Arc<dyn TranslationHandler>,
    pub deliverer: Arc<dyn DeliveryHandler>,
}

/// The immutable route table, built once at startup.
pub struct RouteSet {
    routes: Vec<Route>,
}

impl RouteSet {
    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn validator_for_source(&self, source: &str) -> Option<&Arc<dyn ValidationHandler>> {
        self.routes
            .iter()
            .find(|route| route.source_type == source)
            .map(|route| &route.validator)
    }

    /// Target payload types of all routes with the given source, in
    /// configuration order. Duplicate specs were collapsed at build time, so
    /// the result is a set.
    pub fn targets_for_source(&self, source: &str) -> Vec<&str> {
        self.routes
            .iter()
            .filter(|route| route.source_type == source)
            .map(|route| route.target_type.as_str())
            .collect()
    }

    pub fn translator_for(&self, source: &str, target: &str) -> Option<&Arc<dyn TranslationHandler>> {
        self.routes
            .iter()
            .find(|route| route.source_type == source && route.target_type == target)
            .map(|route| &route.translator)
    }

    pub fn deliverer_for(&self, target: &str) -> Option<&Arc<dyn DeliveryHandler>> {
        self.routes
            .iter()
            .find(|route| route.target_type == target)
            .map(|route| &route.deliverer)
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum RouteBuildError {
    #[error("route spec {0:?} is not of the form \"SOURCE -> TARGET\"")]
    MalformedSpec(String),

    #[error("payload type {0:?} contains characters outside [A-Za-z0-9.-]")]
    BadPayloadType(String),

    #[error("no validation handler is registered for payload type {0:?}")]
    MissingValidationHandler(String),

    #[error("no translation handler is registered for {0:?}")]
    MissingTranslationHandler(String),

    #[error("no delivery handler is registered for payload type {0:?}")]
    MissingDeliveryHandler(String),

    #[error("handler {type_id:?} failed to initialize")]
    InitFailed {
        type_id: String,
        #[source]
        cause: HandlerError,
    },

    #[error("no routes are configured")]
    NoRoutes,
}

/// Builds the route table from a comma-separated list of `"SOURCE -> TARGET"`
/// specs. Blank fragments (a trailing comma, say) are tolerated; anything
/// else malformed is fatal. Each distinct handler is instantiated and
/// initialized exactly once, then shared across all routes that use it.
pub fn build_routes(spec: &str, registry: &HandlerRegistry) -> Result<RouteSet, RouteBuildError> {
    let mut validators: HashMap<String, Arc<dyn ValidationHandler>> = HashMap::new();
    let mut translators: HashMap<(String, String), Arc<dyn TranslationHandler>> = HashMap::new();
    let mut deliverers: HashMap<String, Arc<dyn DeliveryHandler>> = HashMap::new();
    let mut routes = Vec::new();

    for fragment in spec.split(',') {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            continue;
        }

        let (source, target) = fragment
            .split_once("->")
            .ok_or_else(|| RouteBuildError::MalformedSpec(fragment.to_string()))?;
        let (source, target) = (source.trim(), target.trim());
        for payload_type in [source, target] {
            if !is_well_formed_payload_type(payload_type) {
                return Err(RouteBuildError::BadPayloadType(payload_type.to_string()));
            }
        }

        let pair = (source.to_string(), target.to_string());
        if translators.contains_key(&pair) {
            // Same spec given twice; the first occurrence won.
            continue;
        }

        let validator = match validators.get(source) {
            Some(shared) => shared.clone(),
            None => {
                let mut handler = registry
                    .instantiate_validation(source)
                    .ok_or_else(|| RouteBuildError::MissingValidationHandler(source.to_string()))?;
                init_handler(source, handler.init())?;
                let shared: Arc<dyn ValidationHandler> = Arc::from(handler);
                validators.insert(source.to_string(), shared.clone());
                shared
            }
        };

        let translator_id = format!("{source}->{target}");
        let mut handler = registry
            .instantiate_translation(&translator_id)
            .ok_or_else(|| RouteBuildError::MissingTranslationHandler(translator_id.clone()))?;
        init_handler(&translator_id, handler.init())?;
        let translator: Arc<dyn TranslationHandler> = Arc::from(handler);
        translators.insert(pair, translator.clone());

        let deliverer = match deliverers.get(target) {
            Some(shared) => shared.clone(),
            None => {
                let mut handler = registry
                    .instantiate_delivery(target)
                    .ok_or_else(|| RouteBuildError::MissingDeliveryHandler(target.to_string()))?;
                init_handler(target, handler.init())?;
                let shared: Arc<dyn DeliveryHandler> = Arc::from(handler);
                deliverers.insert(target.to_string(), shared.clone());
                shared
            }
        };

        routes.push(Route {
            source_type: source.to_string(),
            target_type: target.to_string(),
            validator,
            translator,
            deliverer,
        });
    }

    if routes.is_empty() {
        return Err(RouteBuildError::NoRoutes);
    }

    Ok(RouteSet { routes })
}

fn init_handler(type_id: &str, result: Result<(), HandlerError>) -> Result<(), RouteBuildError> {
    result.map_err(|cause| RouteBuildError::InitFailed {
        type_id: type_id.to_string(),
        cause,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> HandlerRegistry {
        HandlerRegistry::builtin()
    }

    #[test]
    fn payload_type_charset() {
        assert!(is_well_formed_payload_type("test-foo.v1"));
        assert!(is_well_formed_payload_type("A.b-C.9"));
        assert!(!is_well_formed_payload_type(""));
        assert!(!is_well_formed_payload_type("has space"));
        assert!(!is_well_formed_payload_type("arrow->type"));
        assert!(!is_well_formed_payload_type("slash/v1"));
    }

    #[test]
    fn builds_a_single_route() {
        let routes = build_routes("test-foo.v1 -> test-bar.v1", &registry()).unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes.targets_for_source("test-foo.v1"), vec!["test-bar.v1"]);
        assert!(routes.validator_for_source("test-foo.v1").is_some());
        assert!(routes.translator_for("test-foo.v1", "test-bar.v1").is_some());
        assert!(routes.deliverer_for("test-bar.v1").is_some());
    }

    #[test]
    fn trailing_comma_and_blank_fragments_are_tolerated() {
        let routes =
            build_routes("test-foo.v1 -> test-bar.v1, , test-foo.v1->test-baz.v1,", &registry())
                .unwrap();
        assert_eq!(routes.len(), 2);
    }

    #[test]
    fn fan_out_shares_one_validator_instance() {
        let routes =
            build_routes("test-foo.v1 -> test-bar.v1, test-foo.v1 -> test-baz.v1", &registry())
                .unwrap();
        let all: Vec<_> = routes.iter().collect();
        assert!(Arc::ptr_eq(&all[0].validator, &all[1].validator));
        assert!(!Arc::ptr_eq(
            routes.deliverer_for("test-bar.v1").unwrap(),
            routes.deliverer_for("test-baz.v1").unwrap(),
        ));
    }

    #[test]
    fn duplicate_specs_collapse_into_one_route() {
        let routes =
            build_routes("test-foo.v1 -> test-bar.v1, test-foo.v1 -> test-bar.v1", &registry())
                .unwrap();
        assert_eq!(routes.len(), 1);
    }

    #[test]
    fn malformed_specs_are_fatal() {
        assert!(matches!(
            build_routes("test-foo.v1", &registry()),
            Err(RouteBuildError::MalformedSpec(_))
        ));
        assert!(matches!(
            build_routes("a b -> test-bar.v1", &registry()),
            Err(RouteBuildError::BadPayloadType(_))
        ));
    }

    #[test]
    fn unknown_handlers_are_fatal() {
        assert!(matches!(
            build_routes("unknown.v1 -> test-bar.v1", &registry()),
            Err(RouteBuildError::MissingValidationHandler(_))
        ));
        assert!(matches!(
            build_routes("test-foo.v1 -> unknown.v1", &registry()),
            Err(RouteBuildError::MissingTranslationHandler(_))
        ));
    }

    #[test]
    fn an_empty_route_list_is_fatal() {
        assert!(matches!(
            build_routes("", &registry()),
            Err(RouteBuildError::NoRoutes)
        ));
        assert!(matches!(
            build_routes(" , ", &registry()),
            Err(RouteBuildError::NoRoutes)
        ));
    }
}
