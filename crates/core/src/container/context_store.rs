use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;
use uuid::Uuid;

use crate::container::context::{ContextId, ContextState, InstanceContext};
use crate::container::scope::Scope;
use crate::errors::ContainerError;

/// Token identifying one logical execution unit (a request worker, a test).
///
/// Context activation and the active-context lookup are keyed by this token
/// explicitly; the store holds no thread-local or other ambient state, which
/// keeps activation testable without real threads.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExecutionUnit {
    id: Uuid,
}

impl ExecutionUnit {
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Default for ExecutionUnit {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExecutionUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unit:{}", self.id)
    }
}

/// Per-scope storage of live contexts and their activation state.
///
/// Holds every live context keyed by id, plus the set of context ids active
/// per (scope, execution unit). The singleton scope is backed by a single
/// always-active context owned by the store.
pub struct ContextStore {
    scopes: Vec<Scope>,
    singleton: Arc<InstanceContext>,
    contexts: RwLock<HashMap<ContextId, Arc<InstanceContext>>>,
    active: RwLock<HashMap<(Scope, Uuid), Vec<ContextId>>>,
}

impl std::fmt::Debug for ContextStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextStore")
            .field("scopes", &self.scopes)
            .finish()
    }
}

impl ContextStore {
    /// Create a store supporting the built-in scopes plus any custom tags
    pub fn new(custom_scopes: Vec<Scope>) -> Self {
        let mut scopes = vec![Scope::Singleton, Scope::Request, Scope::Session, Scope::Dependent];
        for scope in custom_scopes {
            if !scopes.contains(&scope) {
                scopes.push(scope);
            }
        }
        Self {
            scopes,
            singleton: Arc::new(InstanceContext::new(Scope::Singleton, ContextState::Active)),
            contexts: RwLock::new(HashMap::new()),
            active: RwLock::new(HashMap::new()),
        }
    }

    /// All supported scope tags
    pub fn scopes(&self) -> Vec<Scope> {
        self.scopes.clone()
    }

    pub fn supports(&self, scope: Scope) -> bool {
        self.scopes.contains(&scope)
    }

    /// The always-active singleton context
    pub fn singleton_context(&self) -> &Arc<InstanceContext> {
        &self.singleton
    }

    fn ensure_activatable(&self, scope: Scope) -> Result<(), ContainerError> {
        if !self.supports(scope) || scope.is_singleton() || scope.is_dependent() {
            return Err(ContainerError::UnsupportedScope { scope });
        }
        Ok(())
    }

    /// Enter a scope: create a fresh context and mark it active for the unit.
    ///
    /// Activating while another context of the same scope is already active
    /// for the unit is not rejected here; the resulting ambiguity is reported
    /// by `active_context`.
    pub fn activate(
        &self,
        scope: Scope,
        unit: &ExecutionUnit,
    ) -> Result<Arc<InstanceContext>, ContainerError> {
        self.ensure_activatable(scope)?;

        let context = Arc::new(InstanceContext::new(scope, ContextState::Active));
        let id = context.id();

        let mut contexts = self
            .contexts
            .write()
            .map_err(|_| ContainerError::lock("store_contexts"))?;
        contexts.insert(id, context.clone());
        drop(contexts);

        let mut active = self
            .active
            .write()
            .map_err(|_| ContainerError::lock("store_active"))?;
        active.entry((scope, unit.id)).or_default().push(id);

        debug!(%scope, %unit, context = %id, "context activated");
        Ok(context)
    }

    /// Re-activate a previously deactivated context for the unit
    pub fn resume(
        &self,
        scope: Scope,
        unit: &ExecutionUnit,
        id: &ContextId,
    ) -> Result<Arc<InstanceContext>, ContainerError> {
        self.ensure_activatable(scope)?;

        let context = {
            let contexts = self
                .contexts
                .read()
                .map_err(|_| ContainerError::lock("store_contexts"))?;
            contexts
                .get(id)
                .cloned()
                .ok_or(ContainerError::NotActive { scope })?
        };
        if context.scope() != scope {
            return Err(ContainerError::UnsupportedScope { scope });
        }
        context.resume()?;

        let mut active = self
            .active
            .write()
            .map_err(|_| ContainerError::lock("store_active"))?;
        let entries = active.entry((scope, unit.id)).or_default();
        if !entries.contains(id) {
            entries.push(*id);
        }

        debug!(%scope, %unit, context = %id, "context resumed");
        Ok(context)
    }

    /// Suspend the unit's active context without destroying stored instances.
    ///
    /// Returns the suspended context's id, or `None` when nothing was active.
    /// More than one active context is an ambiguity the caller must resolve.
    pub fn deactivate(
        &self,
        scope: Scope,
        unit: &ExecutionUnit,
    ) -> Result<Option<ContextId>, ContainerError> {
        self.ensure_activatable(scope)?;

        let id = {
            let mut active = self
                .active
                .write()
                .map_err(|_| ContainerError::lock("store_active"))?;
            match active.get_mut(&(scope, unit.id)) {
                None => return Ok(None),
                Some(entries) => match entries.len() {
                    0 => return Ok(None),
                    1 => entries.pop().unwrap(),
                    n => return Err(ContainerError::ambiguous_context(scope, n)),
                },
            }
        };

        if let Some(context) = self.context_by_id(&id)? {
            context.suspend();
        }
        debug!(%scope, %unit, context = %id, "context deactivated");
        Ok(Some(id))
    }

    /// Destroy the unit's active context. A no-op when none is active.
    pub fn destroy_active(
        &self,
        scope: Scope,
        unit: &ExecutionUnit,
    ) -> Result<(), ContainerError> {
        match self.deactivate(scope, unit)? {
            Some(id) => self.destroy_context(&id),
            None => Ok(()),
        }
    }

    /// Destroy a context by id, whether active or suspended
    pub fn destroy_context(&self, id: &ContextId) -> Result<(), ContainerError> {
        let context = {
            let mut contexts = self
                .contexts
                .write()
                .map_err(|_| ContainerError::lock("store_contexts"))?;
            contexts.remove(id)
        };

        let mut active = self
            .active
            .write()
            .map_err(|_| ContainerError::lock("store_active"))?;
        for entries in active.values_mut() {
            entries.retain(|entry| entry != id);
        }
        drop(active);

        if let Some(context) = context {
            context.destroy();
        }
        Ok(())
    }

    /// The active context of a scope for a unit.
    ///
    /// Three distinct outcomes: `Ok(None)` when none is active, `Ok(Some)`
    /// for exactly one, and `AmbiguousContext` when more than one context of
    /// the scope is simultaneously active for the unit.
    pub fn active_context(
        &self,
        scope: Scope,
        unit: &ExecutionUnit,
    ) -> Result<Option<Arc<InstanceContext>>, ContainerError> {
        if scope.is_singleton() {
            return Ok(Some(self.singleton.clone()));
        }
        if scope.is_dependent() {
            return Ok(None);
        }

        let ids = {
            let active = self
                .active
                .read()
                .map_err(|_| ContainerError::lock("store_active"))?;
            active.get(&(scope, unit.id)).cloned().unwrap_or_default()
        };

        match ids.as_slice() {
            [] => Ok(None),
            [id] => self.context_by_id(id),
            many => Err(ContainerError::ambiguous_context(scope, many.len())),
        }
    }

    /// Every live context of a scope, active or suspended
    pub fn contexts(&self, scope: Scope) -> Result<Vec<Arc<InstanceContext>>, ContainerError> {
        if scope.is_singleton() {
            return Ok(vec![self.singleton.clone()]);
        }
        let contexts = self
            .contexts
            .read()
            .map_err(|_| ContainerError::lock("store_contexts"))?;
        Ok(contexts
            .values()
            .filter(|ctx| ctx.scope() == scope)
            .cloned()
            .collect())
    }

    fn context_by_id(
        &self,
        id: &ContextId,
    ) -> Result<Option<Arc<InstanceContext>>, ContainerError> {
        let contexts = self
            .contexts
            .read()
            .map_err(|_| ContainerError::lock("store_contexts"))?;
        Ok(contexts.get(id).cloned())
    }

    /// Destroy every live context, the singleton last
    pub fn destroy_all(&self) -> Result<(), ContainerError> {
        let drained: Vec<Arc<InstanceContext>> = {
            let mut contexts = self
                .contexts
                .write()
                .map_err(|_| ContainerError::lock("store_contexts"))?;
            contexts.drain().map(|(_, ctx)| ctx).collect()
        };
        {
            let mut active = self
                .active
                .write()
                .map_err(|_| ContainerError::lock("store_active"))?;
            active.clear();
        }
        for context in drained {
            context.destroy();
        }
        self.singleton.destroy();
        Ok(())
    }
}
