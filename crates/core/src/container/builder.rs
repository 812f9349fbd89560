use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tracing::info;

use crate::container::container::{Container, ContainerInner};
use crate::container::context_store::ContextStore;
use crate::container::observers::{ObserverDispatcher, ObserverEntry};
use crate::container::provider::Provider;
use crate::container::registry::RegistryBuilder;
use crate::container::resolver::InstanceResolver;
use crate::container::scope::Scope;
use crate::errors::ContainerError;

/// Explicit initialization phase for a container.
///
/// Registration input comes fully resolved from the build-time discovery
/// collaborator; once `build` freezes the registry, no further registration
/// is possible.
pub struct ContainerBuilder {
    registry: RegistryBuilder,
    custom_scopes: Vec<Scope>,
    executor: Option<tokio::runtime::Handle>,
    strict: bool,
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self {
            registry: RegistryBuilder::new(),
            custom_scopes: Vec::new(),
            executor: None,
            strict: false,
        }
    }

    /// Register a provider
    pub fn provider(mut self, provider: Provider) -> Self {
        self.registry = self.registry.register(provider);
        self
    }

    /// Register an observer entry
    pub fn observer(mut self, entry: ObserverEntry) -> Self {
        self.registry = self.registry.register_observer(entry);
        self
    }

    /// Declare a qualifier type that appears only in requests
    pub fn qualifier_type(mut self, name: impl Into<String>) -> Self {
        self.registry = self.registry.qualifier_type(name);
        self
    }

    /// Register a custom scope tag
    pub fn scope(mut self, scope: Scope) -> Self {
        self.custom_scopes.push(scope);
        self
    }

    /// Expose a work-submission surface to asynchronous collaborators
    pub fn with_executor(mut self, executor: tokio::runtime::Handle) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Enable strict compatibility mode; disambiguation consults this flag
    pub fn strict_compatibility(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Freeze the registry and start the container
    pub fn build(self) -> Result<Container, ContainerError> {
        let registry = Arc::new(self.registry.build()?);
        let contexts = Arc::new(ContextStore::new(self.custom_scopes));
        let resolver = InstanceResolver::new(registry.clone(), contexts.clone(), self.strict);
        let dispatcher = ObserverDispatcher::new(registry.clone());

        info!(
            providers = registry.providers().len(),
            observers = registry.observers().len(),
            strict = self.strict,
            "container started"
        );
        Ok(Container::from_inner(ContainerInner {
            registry,
            contexts,
            resolver,
            dispatcher,
            executor: self.executor,
            strict: self.strict,
            running: AtomicBool::new(true),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::context_store::ExecutionUnit;

    #[derive(Debug)]
    struct Greeter;

    #[test]
    fn test_builder_flags() {
        let container = Container::builder()
            .strict_compatibility(true)
            .scope(Scope::Custom("conversation"))
            .build()
            .unwrap();

        assert!(container.strict_compatibility());
        assert!(container.scopes().contains(&Scope::Custom("conversation")));
        assert!(container.is_running());
    }

    #[test]
    fn test_duplicate_registration_fails_build() {
        let result = Container::builder()
            .provider(
                Provider::builder::<Greeter>()
                    .id("same")
                    .factory(|_| Ok(Greeter))
                    .build()
                    .unwrap(),
            )
            .provider(
                Provider::builder::<Greeter>()
                    .id("same")
                    .factory(|_| Ok(Greeter))
                    .build()
                    .unwrap(),
            )
            .build();
        assert!(matches!(
            result,
            Err(ContainerError::DuplicateProvider { .. })
        ));
    }

    #[test]
    fn test_custom_scope_is_activatable() {
        let container = Container::builder()
            .scope(Scope::Custom("conversation"))
            .build()
            .unwrap();
        let unit = ExecutionUnit::new();

        let handle = container
            .scope_handle(Scope::Custom("conversation"), &unit)
            .unwrap();
        handle.activate().unwrap();
        assert!(handle.is_active());
    }
}
