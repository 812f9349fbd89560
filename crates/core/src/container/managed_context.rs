use std::sync::Arc;

use crate::container::context::{ContextId, InstanceContext};
use crate::container::context_store::{ContextStore, ExecutionUnit};
use crate::container::scope::Scope;
use crate::errors::ContainerError;

/// Control handle over one scope's lifecycle for one execution unit.
///
/// The container exposes dedicated handles for the built-in request and
/// session scopes; other context-backed scopes get one through
/// `Container::scope_handle`. Obtaining the handle never fails just because
/// nothing is active yet.
#[derive(Debug, Clone)]
pub struct ManagedContext {
    scope: Scope,
    unit: ExecutionUnit,
    store: Arc<ContextStore>,
}

impl ManagedContext {
    pub(crate) fn new(scope: Scope, unit: ExecutionUnit, store: Arc<ContextStore>) -> Self {
        Self { scope, unit, store }
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Enter the scope: create and activate a fresh context
    pub fn activate(&self) -> Result<Arc<InstanceContext>, ContainerError> {
        self.store.activate(self.scope, &self.unit)
    }

    /// Re-activate a previously deactivated context, resuming its stored
    /// instances
    pub fn resume(&self, id: &ContextId) -> Result<Arc<InstanceContext>, ContainerError> {
        self.store.resume(self.scope, &self.unit, id)
    }

    /// Suspend the active context without destroying stored instances.
    /// Returns the suspended context's id for a later `resume`.
    pub fn deactivate(&self) -> Result<Option<ContextId>, ContainerError> {
        self.store.deactivate(self.scope, &self.unit)
    }

    /// Leave the scope: destroy the active context and everything it stores.
    /// A no-op when nothing is active.
    pub fn destroy(&self) -> Result<(), ContainerError> {
        self.store.destroy_active(self.scope, &self.unit)
    }

    /// Whether exactly one context is currently active for the unit
    pub fn is_active(&self) -> bool {
        matches!(
            self.store.active_context(self.scope, &self.unit),
            Ok(Some(_))
        )
    }

    /// The active context: none, exactly one, or an ambiguity error
    pub fn context(&self) -> Result<Option<Arc<InstanceContext>>, ContainerError> {
        self.store.active_context(self.scope, &self.unit)
    }
}
