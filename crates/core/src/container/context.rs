use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, trace};
use uuid::Uuid;

use crate::container::instance::ManagedInstance;
use crate::container::provider::Provider;
use crate::container::scope::Scope;
use crate::errors::ContainerError;

/// Identifier of one context instantiation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(Uuid);

impl ContextId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Suspended; stored instances are kept but get/put fail
    Inactive,
    /// Associated with an execution unit; get/put permitted
    Active,
    /// Terminal; all stored instances have been finalized
    Destroyed,
}

/// Per-scope storage of live managed instances.
///
/// Created when its scope is entered, destroyed when the scope ends.
/// `get`/`put`/`get_or_create` are permitted only while active. Construction
/// of a given key is serialized so at most one caller runs the provider
/// factory per key; other concurrent requesters wait for that result.
pub struct InstanceContext {
    id: ContextId,
    scope: Scope,
    state: RwLock<ContextState>,
    instances: RwLock<HashMap<String, Arc<ManagedInstance>>>,
    creation_order: Mutex<Vec<String>>,
    creating: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl std::fmt::Debug for InstanceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceContext")
            .field("id", &self.id)
            .field("scope", &self.scope)
            .field("state", &self.state())
            .field("instance_count", &self.instance_count())
            .finish()
    }
}

impl InstanceContext {
    pub(crate) fn new(scope: Scope, state: ContextState) -> Self {
        Self {
            id: ContextId::new(),
            scope,
            state: RwLock::new(state),
            instances: RwLock::new(HashMap::new()),
            creation_order: Mutex::new(Vec::new()),
            creating: Mutex::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn state(&self) -> ContextState {
        match self.state.read() {
            Ok(state) => *state,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.state() == ContextState::Active
    }

    /// Number of instances currently stored
    pub fn instance_count(&self) -> usize {
        match self.instances.read() {
            Ok(map) => map.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    fn ensure_active(&self) -> Result<(), ContainerError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(ContainerError::not_active(self.scope))
        }
    }

    /// Fetch the stored instance for a provider, if any
    pub fn get(&self, provider: &Provider) -> Result<Option<Arc<ManagedInstance>>, ContainerError> {
        self.ensure_active()?;
        let instances = self
            .instances
            .read()
            .map_err(|_| ContainerError::lock("context_instances"))?;
        Ok(instances.get(provider.id()).cloned())
    }

    /// Store a caller-constructed value for a provider
    pub fn put(
        &self,
        provider: &Arc<Provider>,
        value: Arc<dyn Any + Send + Sync>,
    ) -> Result<(), ContainerError> {
        self.ensure_active()?;
        let instance = Arc::new(ManagedInstance::new(provider.clone(), value, Vec::new()));
        let replaced = {
            let mut instances = self
                .instances
                .write()
                .map_err(|_| ContainerError::lock("context_instances"))?;
            instances.insert(provider.id().to_string(), instance)
        };
        if replaced.is_none() {
            self.record_creation(provider.id())?;
        }
        Ok(())
    }

    /// Fetch the instance for a provider, constructing it with `build` if it
    /// does not exist yet.
    ///
    /// Double-checked: the fast path is a read lock; on a miss the caller
    /// takes a per-key creation lock, re-checks, and only then constructs.
    /// Exactly one construction happens per key per context.
    pub fn get_or_create<F>(
        &self,
        provider: &Arc<Provider>,
        build: F,
    ) -> Result<Arc<ManagedInstance>, ContainerError>
    where
        F: FnOnce() -> Result<Arc<ManagedInstance>, ContainerError>,
    {
        self.ensure_active()?;

        if let Some(existing) = self.lookup(provider.id())? {
            return Ok(existing);
        }

        let key_lock = {
            let mut creating = self
                .creating
                .lock()
                .map_err(|_| ContainerError::lock("context_creating"))?;
            creating
                .entry(provider.id().to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let _creation_guard = key_lock
            .lock()
            .map_err(|_| ContainerError::lock("context_key_lock"))?;

        // A concurrent caller may have won the creation lock first
        self.ensure_active()?;
        if let Some(existing) = self.lookup(provider.id())? {
            return Ok(existing);
        }

        trace!(provider = provider.id(), context = %self.id, "constructing instance");
        let instance = build()?;

        let mut instances = self
            .instances
            .write()
            .map_err(|_| ContainerError::lock("context_instances"))?;
        instances.insert(provider.id().to_string(), instance.clone());
        drop(instances);
        self.record_creation(provider.id())?;

        Ok(instance)
    }

    fn lookup(&self, provider_id: &str) -> Result<Option<Arc<ManagedInstance>>, ContainerError> {
        let instances = self
            .instances
            .read()
            .map_err(|_| ContainerError::lock("context_instances"))?;
        Ok(instances.get(provider_id).cloned())
    }

    fn record_creation(&self, provider_id: &str) -> Result<(), ContainerError> {
        let mut order = self
            .creation_order
            .lock()
            .map_err(|_| ContainerError::lock("context_creation_order"))?;
        order.push(provider_id.to_string());
        Ok(())
    }

    /// Suspend the context without destroying stored instances
    pub(crate) fn suspend(&self) {
        let mut state = match self.state.write() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *state == ContextState::Active {
            *state = ContextState::Inactive;
        }
    }

    /// Resume a suspended context
    pub(crate) fn resume(&self) -> Result<(), ContainerError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| ContainerError::lock("context_state"))?;
        match *state {
            ContextState::Inactive => {
                *state = ContextState::Active;
                Ok(())
            }
            ContextState::Active => Ok(()),
            ContextState::Destroyed => Err(ContainerError::not_active(self.scope)),
        }
    }

    /// Terminal teardown: finalize every stored instance in reverse creation
    /// order, dependents cascading first, and leave the context destroyed.
    pub fn destroy(&self) {
        {
            let mut state = match self.state.write() {
                Ok(state) => state,
                Err(poisoned) => poisoned.into_inner(),
            };
            if *state == ContextState::Destroyed {
                return;
            }
            *state = ContextState::Destroyed;
        }

        let order = match self.creation_order.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        let mut instances = match self.instances.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        debug!(context = %self.id, scope = %self.scope, count = order.len(), "destroying context");
        for provider_id in order.iter().rev() {
            if let Some(instance) = instances.remove(provider_id) {
                instance.destroy();
            }
        }
        instances.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn provider(label: &str) -> Arc<Provider> {
        let label = label.to_string();
        Arc::new(
            Provider::builder::<String>()
                .id(format!("test::{}", label))
                .scope(Scope::Request)
                .factory(move |_| Ok(label.clone()))
                .build()
                .unwrap(),
        )
    }

    fn instance_of(provider: &Arc<Provider>, value: &str) -> Arc<ManagedInstance> {
        Arc::new(ManagedInstance::new(
            provider.clone(),
            Arc::new(value.to_string()),
            Vec::new(),
        ))
    }

    #[test]
    fn test_get_put_require_active() {
        let ctx = InstanceContext::new(Scope::Request, ContextState::Inactive);
        let p = provider("a");

        let err = ctx.get(&p).unwrap_err();
        assert!(err.is_not_active());
        let err = ctx.put(&p, Arc::new("x".to_string())).unwrap_err();
        assert!(err.is_not_active());

        ctx.resume().unwrap();
        ctx.put(&p, Arc::new("x".to_string())).unwrap();
        assert!(ctx.get(&p).unwrap().is_some());
    }

    #[test]
    fn test_destroy_is_terminal() {
        let ctx = InstanceContext::new(Scope::Request, ContextState::Active);
        let p = provider("a");
        ctx.put(&p, Arc::new("x".to_string())).unwrap();

        ctx.destroy();

        assert_eq!(ctx.state(), ContextState::Destroyed);
        assert!(ctx.get(&p).unwrap_err().is_not_active());
        assert!(ctx.resume().is_err());
        assert_eq!(ctx.instance_count(), 0);
    }

    #[test]
    fn test_suspend_keeps_instances() {
        let ctx = InstanceContext::new(Scope::Session, ContextState::Active);
        let p = provider("a");
        ctx.put(&p, Arc::new("x".to_string())).unwrap();

        ctx.suspend();
        assert!(ctx.get(&p).unwrap_err().is_not_active());
        assert_eq!(ctx.instance_count(), 1);

        ctx.resume().unwrap();
        assert!(ctx.get(&p).unwrap().is_some());
    }

    #[test]
    fn test_single_construction_under_contention() {
        let ctx = Arc::new(InstanceContext::new(Scope::Request, ContextState::Active));
        let p = provider("shared");
        let constructions = Arc::new(AtomicUsize::new(0));

        let mut handles = vec![];
        for _ in 0..8 {
            let ctx = ctx.clone();
            let p = p.clone();
            let constructions = constructions.clone();
            handles.push(thread::spawn(move || {
                let instance = ctx
                    .get_or_create(&p, || {
                        constructions.fetch_add(1, Ordering::SeqCst);
                        Ok(instance_of(&p, "shared"))
                    })
                    .unwrap();
                Arc::as_ptr(instance.value()) as *const () as usize
            }));
        }

        let pointers: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(constructions.load(Ordering::SeqCst), 1);
        assert!(pointers.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_destruction_order_is_reverse_of_creation() {
        let ctx = InstanceContext::new(Scope::Request, ContextState::Active);
        let order = Arc::new(Mutex::new(Vec::new()));

        for label in ["first", "second", "third"] {
            let order = order.clone();
            let p = Arc::new(
                Provider::builder::<String>()
                    .id(format!("ordered::{}", label))
                    .scope(Scope::Request)
                    .factory({
                        let label = label.to_string();
                        move |_| Ok(label.clone())
                    })
                    .destroyer(move |value: &String| {
                        order.lock().unwrap().push(value.clone());
                        Ok(())
                    })
                    .build()
                    .unwrap(),
            );
            ctx.get_or_create(&p, || {
                Ok(Arc::new(ManagedInstance::new(
                    p.clone(),
                    Arc::new(label.to_string()),
                    Vec::new(),
                )))
            })
            .unwrap();
        }

        ctx.destroy();

        assert_eq!(
            *order.lock().unwrap(),
            vec!["third".to_string(), "second".to_string(), "first".to_string()]
        );
    }
}
