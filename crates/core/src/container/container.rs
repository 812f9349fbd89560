use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info;

use crate::container::builder::ContainerBuilder;
use crate::container::context::InstanceContext;
use crate::container::context_store::{ContextStore, ExecutionUnit};
use crate::container::contract::TypeExpr;
use crate::container::handle::{Handle, InstanceSupplier};
use crate::container::managed_context::ManagedContext;
use crate::container::observers::{ObserverDispatcher, ObserverEntry};
use crate::container::provider::Provider;
use crate::container::qualifier::{Qualifier, QualifierSet};
use crate::container::registry::ProviderRegistry;
use crate::container::resolver::InstanceResolver;
use crate::container::scope::Scope;
use crate::errors::ContainerError;

pub(crate) struct ContainerInner {
    pub(crate) registry: Arc<ProviderRegistry>,
    pub(crate) contexts: Arc<ContextStore>,
    pub(crate) resolver: InstanceResolver,
    pub(crate) dispatcher: ObserverDispatcher,
    pub(crate) executor: Option<tokio::runtime::Handle>,
    pub(crate) strict: bool,
    pub(crate) running: AtomicBool,
}

/// The container: resolution, lifecycle, and observer queries over an
/// immutable registry.
///
/// Built once through [`ContainerBuilder`] and passed by reference (cheap
/// `Clone`) to everything that resolves; there is no ambient global
/// instance.
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("registry", &self.inner.registry)
            .field("strict", &self.inner.strict)
            .field("running", &self.is_running())
            .finish()
    }
}

impl Container {
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    pub(crate) fn from_inner(inner: ContainerInner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    fn ensure_running(&self) -> Result<(), ContainerError> {
        if self.is_running() {
            Ok(())
        } else {
            Err(ContainerError::NotRunning)
        }
    }

    /// Resolve a unique instance for type `T`.
    ///
    /// The handle is empty when no provider matches; a priority tie among
    /// candidates is an ambiguity error rather than an arbitrary pick.
    pub fn instance<T: Send + Sync + 'static>(
        &self,
        unit: &ExecutionUnit,
        qualifiers: &[Qualifier],
    ) -> Result<Handle<T>, ContainerError> {
        self.instance_with(unit, TypeExpr::of::<T>(), QualifierSet::from_slice(qualifiers))
    }

    /// Resolve against an explicit contract expr, for parameterized or
    /// wildcard requests
    pub fn instance_expr<T: Send + Sync + 'static>(
        &self,
        unit: &ExecutionUnit,
        contract: TypeExpr,
        qualifiers: &[Qualifier],
    ) -> Result<Handle<T>, ContainerError> {
        self.instance_with(unit, contract, QualifierSet::from_slice(qualifiers))
    }

    pub(crate) fn instance_with<T: Send + Sync + 'static>(
        &self,
        unit: &ExecutionUnit,
        contract: TypeExpr,
        qualifiers: QualifierSet,
    ) -> Result<Handle<T>, ContainerError> {
        self.ensure_running()?;
        self.inner.resolver.resolve_contract(unit, contract, qualifiers)
    }

    /// Speculative lookup: like [`Container::instance`] but a missing active
    /// context yields an empty handle instead of failing
    pub fn try_instance<T: Send + Sync + 'static>(
        &self,
        unit: &ExecutionUnit,
        qualifiers: &[Qualifier],
    ) -> Result<Handle<T>, ContainerError> {
        self.ensure_running()?;
        self.inner.resolver.try_resolve_contract(
            unit,
            TypeExpr::of::<T>(),
            QualifierSet::from_slice(qualifiers),
        )
    }

    /// Resolve by unique provider name; unknown names yield an empty handle
    pub fn instance_named<T: Send + Sync + 'static>(
        &self,
        unit: &ExecutionUnit,
        name: &str,
    ) -> Result<Handle<T>, ContainerError> {
        self.ensure_running()?;
        self.inner.resolver.resolve_named(unit, name)
    }

    /// Resolve a specific provider, bypassing matching
    pub fn instance_for<T: Send + Sync + 'static>(
        &self,
        unit: &ExecutionUnit,
        provider: &Arc<Provider>,
    ) -> Result<Handle<T>, ContainerError> {
        self.ensure_running()?;
        self.inner.resolver.resolve_provider(unit, provider)
    }

    /// Handles for every matching candidate, priority descending, ties in
    /// registration order. Never fails on zero or multiple matches.
    pub fn list_all<T: Send + Sync + 'static>(
        &self,
        unit: &ExecutionUnit,
        qualifiers: &[Qualifier],
    ) -> Result<Vec<Handle<T>>, ContainerError> {
        self.list_all_expr(unit, TypeExpr::of::<T>(), qualifiers)
    }

    /// `list_all` against an explicit contract expr
    pub fn list_all_expr<T: Send + Sync + 'static>(
        &self,
        unit: &ExecutionUnit,
        contract: TypeExpr,
        qualifiers: &[Qualifier],
    ) -> Result<Vec<Handle<T>>, ContainerError> {
        self.ensure_running()?;
        self.inner
            .resolver
            .list_all(unit, contract, QualifierSet::from_slice(qualifiers))
    }

    /// A reusable supplier bound to the contract + qualifiers, re-resolving
    /// on each call. `None` when no provider can match.
    pub fn supplier<T: Send + Sync + 'static>(
        &self,
        unit: &ExecutionUnit,
        qualifiers: &[Qualifier],
    ) -> Result<Option<InstanceSupplier<T>>, ContainerError> {
        self.ensure_running()?;
        let contract = TypeExpr::of::<T>();
        let qualifier_set = QualifierSet::from_slice(qualifiers);
        let candidates = self.inner.registry.find(&contract, &qualifier_set)?;
        if candidates.is_empty() {
            return Ok(None);
        }
        Ok(Some(InstanceSupplier::new(
            self.clone(),
            unit.clone(),
            contract,
            qualifier_set,
        )))
    }

    pub(crate) fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.inner.registry
    }

    /// Look up a provider by identifier
    pub fn provider(&self, id: &str) -> Option<Arc<Provider>> {
        self.inner.registry.provider_by_id(id)
    }

    /// Look up a provider by unique name
    pub fn named_provider(&self, name: &str) -> Option<Arc<Provider>> {
        self.inner.registry.find_by_name(name)
    }

    /// The active context for a scope: none, exactly one, or an ambiguity
    /// error when more than one is active for the unit
    pub fn active_context(
        &self,
        scope: Scope,
        unit: &ExecutionUnit,
    ) -> Result<Option<Arc<InstanceContext>>, ContainerError> {
        self.inner.contexts.active_context(scope, unit)
    }

    /// Every live context of a scope, active or suspended
    pub fn contexts(&self, scope: Scope) -> Result<Vec<Arc<InstanceContext>>, ContainerError> {
        self.inner.contexts.contexts(scope)
    }

    /// All supported scope tags
    pub fn scopes(&self) -> Vec<Scope> {
        self.inner.contexts.scopes()
    }

    /// Lifecycle handle for the built-in request scope
    pub fn request_scope(&self, unit: &ExecutionUnit) -> ManagedContext {
        ManagedContext::new(Scope::Request, unit.clone(), self.inner.contexts.clone())
    }

    /// Lifecycle handle for the built-in session scope
    pub fn session_scope(&self, unit: &ExecutionUnit) -> ManagedContext {
        ManagedContext::new(Scope::Session, unit.clone(), self.inner.contexts.clone())
    }

    /// Lifecycle handle for any context-backed scope
    pub fn scope_handle(
        &self,
        scope: Scope,
        unit: &ExecutionUnit,
    ) -> Result<ManagedContext, ContainerError> {
        if !self.inner.contexts.supports(scope) || !scope.is_context_backed() || scope.is_singleton()
        {
            return Err(ContainerError::UnsupportedScope { scope });
        }
        Ok(ManagedContext::new(
            scope,
            unit.clone(),
            self.inner.contexts.clone(),
        ))
    }

    /// Ordered observers for an event of type `T`
    pub fn resolve_observers<T: Send + Sync + 'static>(
        &self,
        qualifiers: &[Qualifier],
    ) -> Result<Vec<Arc<ObserverEntry>>, ContainerError> {
        self.resolve_observers_expr(&TypeExpr::of::<T>(), qualifiers)
    }

    /// Ordered observers for an explicit event type expr
    pub fn resolve_observers_expr(
        &self,
        event_type: &TypeExpr,
        qualifiers: &[Qualifier],
    ) -> Result<Vec<Arc<ObserverEntry>>, ContainerError> {
        self.ensure_running()?;
        self.inner.dispatcher.observers_for(event_type, qualifiers)
    }

    /// The exposed work-submission surface for asynchronous observer and
    /// event collaborators. Falls back to the caller's current runtime when
    /// none was configured at build.
    pub fn executor(&self) -> Option<tokio::runtime::Handle> {
        self.inner
            .executor
            .clone()
            .or_else(|| tokio::runtime::Handle::try_current().ok())
    }

    /// Whether strict compatibility mode is enabled; disambiguation consults
    /// this flag
    pub fn strict_compatibility(&self) -> bool {
        self.inner.strict
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Stop the container: destroy every live context, singletons last.
    /// Idempotent.
    pub fn shutdown(&self) -> Result<(), ContainerError> {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        info!("container shutting down");
        self.inner.contexts.destroy_all()
    }
}
