pub mod testing;
pub mod webhook;

use crate::registry::HandlerRegistry;

/// Bootstrap registration for every handler family that ships in this
/// repository. Called from `HandlerRegistry::builtin`; deployments with
/// external handler crates call the `register` functions themselves.
pub(crate) fn register_builtin(registry: &mut HandlerRegistry) {
    testing::register(registry);
    webhook::register(registry);
}
