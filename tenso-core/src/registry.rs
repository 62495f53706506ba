use crate::handler::{DeliveryHandler, TranslationHandler, ValidationHandler};
use hashbrown::HashMap;

type ValidationFactory = Box<dyn Fn() -> Box<dyn ValidationHandler> + Send + Sync>;
type TranslationFactory = Box<dyn Fn() -> Box<dyn TranslationHandler> + Send + Sync>;
type DeliveryFactory = Box<dyn Fn() -> Box<dyn DeliveryHandler> + Send + Sync>;

/// Lookup from handler type id to a factory producing a fresh, uninitialized
/// handler instance. Populated once during bootstrap; the route builder is the
/// only consumer. Registration is independent of which routes are configured.
#[derive(Default)]
pub struct HandlerRegistry {
    validation: HashMap<String, ValidationFactory>,
    translation: HashMap<String, TranslationFactory>,
    delivery: HashMap<String, DeliveryFactory>,
}

impl HandlerRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The registry with every handler that ships in this repository.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        crate::handlers::register_builtin(&mut registry);
        registry
    }

    pub fn register_validation(
        &mut self,
        type_id: impl Into<String>,
        factory: impl Fn() -> Box<dyn ValidationHandler> + Send + Sync + 'static,
    ) {
        self.validation.insert(type_id.into(), Box::new(factory));
    }

    pub fn register_translation(
        &mut self,
        type_id: impl Into<String>,
        factory: impl Fn() -> Box<dyn TranslationHandler> + Send + Sync + 'static,
    ) {
        self.translation.insert(type_id.into(), Box::new(factory));
    }

    pub fn register_delivery(
        &mut self,
        type_id: impl Into<String>,
        factory: impl Fn() -> Box<dyn DeliveryHandler> + Send + Sync + 'static,
    ) {
        self.delivery.insert(type_id.into(), Box::new(factory));
    }

    pub fn instantiate_validation(&self, type_id: &str) -> Option<Box<dyn ValidationHandler>> {
        self.validation.get(type_id).map(|factory| factory())
    }

    pub fn instantiate_translation(&self, type_id: &str) -> Option<Box<dyn TranslationHandler>> {
        self.translation.get(type_id).map(|factory| factory())
    }

    pub fn instantiate_delivery(&self, type_id: &str) -> Option<Box<dyn DeliveryHandler>> {
        self.delivery.get(type_id).map(|factory| factory())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_type_ids_instantiate_to_none() {
        let registry = HandlerRegistry::empty();
        assert!(registry.instantiate_validation("nope.v1").is_none());
        assert!(registry.instantiate_translation("nope.v1->nowhere.v1").is_none());
        assert!(registry.instantiate_delivery("nowhere.v1").is_none());
    }

    #[test]
    fn builtin_registry_knows_the_test_family() {
        let registry = HandlerRegistry::builtin();
        assert!(registry.instantiate_validation("test-foo.v1").is_some());
        assert!(
            registry
                .instantiate_translation("test-foo.v1->test-bar.v1")
                .is_some()
        );
        assert!(registry.instantiate_delivery("test-bar.v1").is_some());
    }

    #[test]
    fn each_instantiation_is_a_fresh_instance() {
        let registry = HandlerRegistry::builtin();
        let a = registry.instantiate_validation("test-foo.v1");
        let b = registry.instantiate_validation("test-foo.v1");
        assert!(a.is_some() && b.is_some());
    }
}
