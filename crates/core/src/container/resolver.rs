use std::sync::{Arc, Mutex};

use tracing::{debug, trace};

use crate::container::context_store::{ContextStore, ExecutionUnit};
use crate::container::contract::TypeExpr;
use crate::container::handle::Handle;
use crate::container::instance::ManagedInstance;
use crate::container::provider::Provider;
use crate::container::qualifier::{Qualifier, QualifierSet};
use crate::container::registry::ProviderRegistry;
use crate::errors::ContainerError;

/// Resolution engine: matches contracts against the registry, disambiguates,
/// and produces bound instances through the scope's active context or as
/// caller-owned values for dependent scope.
pub struct InstanceResolver {
    registry: Arc<ProviderRegistry>,
    contexts: Arc<ContextStore>,
    strict: bool,
}

impl std::fmt::Debug for InstanceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceResolver")
            .field("strict", &self.strict)
            .finish()
    }
}

impl InstanceResolver {
    pub fn new(registry: Arc<ProviderRegistry>, contexts: Arc<ContextStore>, strict: bool) -> Self {
        Self {
            registry,
            contexts,
            strict,
        }
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn contexts(&self) -> &Arc<ContextStore> {
        &self.contexts
    }

    /// Resolve a unique provider for the contract and produce a handle.
    ///
    /// Zero candidates yields an empty handle; a tie at the top priority is
    /// an ambiguity error; a missing active context for the winner's scope
    /// is a not-active error.
    pub fn resolve_contract<T: Send + Sync + 'static>(
        &self,
        unit: &ExecutionUnit,
        contract: TypeExpr,
        qualifiers: QualifierSet,
    ) -> Result<Handle<T>, ContainerError> {
        let candidates = self.registry.find(&contract, &qualifiers)?;
        match self.registry.select_unique(&candidates, self.strict)? {
            None => {
                trace!(contract = %contract.type_name(), "no candidate, returning empty handle");
                Ok(Handle::empty())
            }
            Some(provider) => self.materialize(unit, &provider),
        }
    }

    /// Tolerant variant for speculative lookups: a missing active context
    /// yields an empty handle instead of failing.
    pub fn try_resolve_contract<T: Send + Sync + 'static>(
        &self,
        unit: &ExecutionUnit,
        contract: TypeExpr,
        qualifiers: QualifierSet,
    ) -> Result<Handle<T>, ContainerError> {
        match self.resolve_contract(unit, contract, qualifiers) {
            Err(error) if error.is_not_active() => Ok(Handle::empty()),
            other => other,
        }
    }

    /// Resolve by unique provider name. An unknown name is an empty handle.
    pub fn resolve_named<T: Send + Sync + 'static>(
        &self,
        unit: &ExecutionUnit,
        name: &str,
    ) -> Result<Handle<T>, ContainerError> {
        match self.registry.find_by_name(name) {
            None => Ok(Handle::empty()),
            Some(provider) => self.materialize(unit, &provider),
        }
    }

    /// Resolve a specific provider
    pub fn resolve_provider<T: Send + Sync + 'static>(
        &self,
        unit: &ExecutionUnit,
        provider: &Arc<Provider>,
    ) -> Result<Handle<T>, ContainerError> {
        self.materialize(unit, provider)
    }

    /// Every disambiguation-eligible candidate, priority descending, ties in
    /// registration order. Never fails on zero or multiple matches.
    pub fn list_all<T: Send + Sync + 'static>(
        &self,
        unit: &ExecutionUnit,
        contract: TypeExpr,
        qualifiers: QualifierSet,
    ) -> Result<Vec<Handle<T>>, ContainerError> {
        let candidates = self.registry.find(&contract, &qualifiers)?;
        candidates
            .iter()
            .map(|provider| self.materialize(unit, provider))
            .collect()
    }

    fn materialize<T: Send + Sync + 'static>(
        &self,
        unit: &ExecutionUnit,
        provider: &Arc<Provider>,
    ) -> Result<Handle<T>, ContainerError> {
        if provider.scope().is_dependent() {
            // Caller-managed: a fresh instance per resolution, owned by the
            // returned handle until explicitly released
            let instance = self.construct(unit, provider)?;
            let value = Self::downcast_value::<T>(provider, &instance)?;
            return Ok(Handle::owned(value, instance));
        }

        let context = self
            .contexts
            .active_context(provider.scope(), unit)?
            .ok_or_else(|| ContainerError::not_active(provider.scope()))?;
        let instance = context.get_or_create(provider, || self.construct(unit, provider))?;
        let value = Self::downcast_value::<T>(provider, &instance)?;
        Ok(Handle::shared(value, provider.clone()))
    }

    /// Run the provider factory, capturing dependent-scoped instances it
    /// transitively creates so teardown can cascade.
    pub(crate) fn construct(
        &self,
        unit: &ExecutionUnit,
        provider: &Arc<Provider>,
    ) -> Result<Arc<ManagedInstance>, ContainerError> {
        debug!(provider = provider.id(), scope = %provider.scope(), "creating instance");
        let creation = CreationContext::new(self, unit);
        let boxed = provider.create(&creation)?;
        let value: Arc<dyn std::any::Any + Send + Sync> = Arc::from(boxed);
        Ok(Arc::new(ManagedInstance::new(
            provider.clone(),
            value,
            creation.into_dependents(),
        )))
    }

    fn instance_in_context(
        &self,
        unit: &ExecutionUnit,
        provider: &Arc<Provider>,
    ) -> Result<Arc<ManagedInstance>, ContainerError> {
        let context = self
            .contexts
            .active_context(provider.scope(), unit)?
            .ok_or_else(|| ContainerError::not_active(provider.scope()))?;
        context.get_or_create(provider, || self.construct(unit, provider))
    }

    fn downcast_value<T: Send + Sync + 'static>(
        provider: &Arc<Provider>,
        instance: &Arc<ManagedInstance>,
    ) -> Result<Arc<T>, ContainerError> {
        instance
            .downcast::<T>()
            .ok_or_else(|| ContainerError::TypeMismatch {
                type_name: std::any::type_name::<T>().to_string(),
                provider: provider.id().to_string(),
            })
    }
}

/// Handed to provider factories while they run.
///
/// Dependencies resolved through it that turn out to be dependent-scoped are
/// recorded against the instance under construction, so destroying that
/// instance destroys them too.
pub struct CreationContext<'a> {
    resolver: &'a InstanceResolver,
    unit: &'a ExecutionUnit,
    dependents: Mutex<Vec<Arc<ManagedInstance>>>,
}

impl std::fmt::Debug for CreationContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreationContext")
            .field("unit", &self.unit)
            .finish()
    }
}

impl<'a> CreationContext<'a> {
    fn new(resolver: &'a InstanceResolver, unit: &'a ExecutionUnit) -> Self {
        Self {
            resolver,
            unit,
            dependents: Mutex::new(Vec::new()),
        }
    }

    /// The execution unit the surrounding resolution runs under
    pub fn unit(&self) -> &ExecutionUnit {
        self.unit
    }

    /// Resolve an unqualified dependency
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ContainerError> {
        self.resolve_qualified(&[])
    }

    /// Resolve a dependency with qualifiers.
    ///
    /// Injection points are expected to be verified by the build-time
    /// collaborator, so zero candidates here is a hard error rather than an
    /// empty result.
    pub fn resolve_qualified<T: Send + Sync + 'static>(
        &self,
        qualifiers: &[Qualifier],
    ) -> Result<Arc<T>, ContainerError> {
        let contract = TypeExpr::of::<T>();
        let qualifiers = QualifierSet::from_slice(qualifiers);
        let candidates = self.resolver.registry.find(&contract, &qualifiers)?;
        let provider = self
            .resolver
            .registry
            .select_unique(&candidates, self.resolver.strict)?
            .ok_or_else(|| ContainerError::UnsatisfiedDependency {
                type_name: std::any::type_name::<T>().to_string(),
            })?;

        let instance = if provider.scope().is_dependent() {
            let instance = self.resolver.construct(self.unit, &provider)?;
            let mut dependents = self
                .dependents
                .lock()
                .map_err(|_| ContainerError::lock("creation_dependents"))?;
            dependents.push(instance.clone());
            instance
        } else {
            self.resolver.instance_in_context(self.unit, &provider)?
        };

        InstanceResolver::downcast_value::<T>(&provider, &instance)
    }

    fn into_dependents(self) -> Vec<Arc<ManagedInstance>> {
        match self.dependents.into_inner() {
            Ok(dependents) => dependents,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
