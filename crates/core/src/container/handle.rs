use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::container::container::Container;
use crate::container::context_store::ExecutionUnit;
use crate::container::contract::TypeExpr;
use crate::container::instance::ManagedInstance;
use crate::container::provider::Provider;
use crate::container::qualifier::QualifierSet;
use crate::errors::ContainerError;

/// A resolved value plus its release capability.
///
/// For dependent scope the handle owns the underlying instance and `destroy`
/// tears it down, cascading to transitively created dependents; dropping a
/// dependent handle without destroying it leaks the instance until process
/// exit — a documented caller obligation, not a crash. For context-backed
/// scopes the handle shares the context's instance and `destroy` is a no-op.
pub struct Handle<T: Send + Sync + 'static> {
    value: Option<Arc<T>>,
    provider: Option<Arc<Provider>>,
    owned: Option<Arc<ManagedInstance>>,
    released: AtomicBool,
}

impl<T: Send + Sync + 'static> std::fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("type", &std::any::type_name::<T>())
            .field("empty", &self.is_empty())
            .field("owned", &self.owned.is_some())
            .finish()
    }
}

impl<T: Send + Sync + 'static> Handle<T> {
    /// A handle with no resolved value
    pub fn empty() -> Self {
        Self {
            value: None,
            provider: None,
            owned: None,
            released: AtomicBool::new(false),
        }
    }

    pub(crate) fn shared(value: Arc<T>, provider: Arc<Provider>) -> Self {
        Self {
            value: Some(value),
            provider: Some(provider),
            owned: None,
            released: AtomicBool::new(false),
        }
    }

    pub(crate) fn owned(value: Arc<T>, instance: Arc<ManagedInstance>) -> Self {
        let provider = instance.provider().clone();
        Self {
            value: Some(value),
            provider: Some(provider),
            owned: Some(instance),
            released: AtomicBool::new(false),
        }
    }

    /// The resolved value, if any.
    ///
    /// Returns `None` once a caller-owned instance has been destroyed; for
    /// context-backed scopes release is a true no-op and the value stays
    /// reachable through the handle.
    pub fn get(&self) -> Option<Arc<T>> {
        if self.owned.is_some() && self.released.load(Ordering::SeqCst) {
            return None;
        }
        self.value.clone()
    }

    /// Whether no value was resolved
    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    /// The provider behind the value, if any
    pub fn provider(&self) -> Option<&Arc<Provider>> {
        self.provider.as_ref()
    }

    /// Release the handle. Idempotent: the second call is a no-op.
    ///
    /// Performs teardown only for caller-owned (dependent) instances.
    pub fn destroy(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(instance) = &self.owned {
            instance.destroy();
        }
    }
}

/// A reusable callable bound to a fixed contract + qualifier pair.
///
/// Re-resolves on every invocation rather than caching, so each call sees
/// the scope state current at that moment.
pub struct InstanceSupplier<T: Send + Sync + 'static> {
    container: Container,
    unit: ExecutionUnit,
    contract: TypeExpr,
    qualifiers: QualifierSet,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> std::fmt::Debug for InstanceSupplier<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceSupplier")
            .field("contract", &self.contract)
            .field("qualifiers", &self.qualifiers)
            .finish()
    }
}

impl<T: Send + Sync + 'static> InstanceSupplier<T> {
    pub(crate) fn new(
        container: Container,
        unit: ExecutionUnit,
        contract: TypeExpr,
        qualifiers: QualifierSet,
    ) -> Self {
        Self {
            container,
            unit,
            contract,
            qualifiers,
            _marker: std::marker::PhantomData,
        }
    }

    /// Resolve a fresh handle for the bound contract
    pub fn get(&self) -> Result<Handle<T>, ContainerError> {
        self.container.instance_with::<T>(
            &self.unit,
            self.contract.clone(),
            self.qualifiers.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::scope::Scope;

    fn provider() -> Arc<Provider> {
        Arc::new(
            Provider::builder::<String>()
                .scope(Scope::Dependent)
                .factory(|_| Ok("value".to_string()))
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_empty_handle() {
        let handle = Handle::<String>::empty();
        assert!(handle.is_empty());
        assert!(handle.get().is_none());
        assert!(handle.provider().is_none());
        handle.destroy();
    }

    #[test]
    fn test_owned_handle_destroy_is_idempotent() {
        let provider = provider();
        let instance = Arc::new(ManagedInstance::new(
            provider,
            Arc::new("value".to_string()),
            Vec::new(),
        ));
        let handle = Handle::owned(
            instance.downcast::<String>().unwrap(),
            instance.clone(),
        );

        assert_eq!(*handle.get().unwrap(), "value");

        handle.destroy();
        handle.destroy();

        assert!(instance.is_destroyed());
        assert!(handle.get().is_none());
    }

    #[test]
    fn test_shared_handle_destroy_is_a_noop() {
        let provider = provider();
        let handle = Handle::shared(Arc::new("value".to_string()), provider);

        handle.destroy();
        // The underlying value is owned by a context, not the handle
        assert_eq!(*handle.get().unwrap(), "value");
        assert!(!handle.is_empty());
    }
}
