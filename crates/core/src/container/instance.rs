use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::container::provider::Provider;

/// The realized value backing a provider within a context, or owned directly
/// by a caller's handle for dependent scope.
///
/// Records the dependent-scoped instances transitively created during its own
/// construction so that teardown cascades.
pub struct ManagedInstance {
    provider: Arc<Provider>,
    value: Arc<dyn Any + Send + Sync>,
    dependents: Mutex<Vec<Arc<ManagedInstance>>>,
    destroyed: AtomicBool,
}

impl std::fmt::Debug for ManagedInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedInstance")
            .field("provider", &self.provider.id())
            .field("destroyed", &self.destroyed.load(Ordering::SeqCst))
            .finish()
    }
}

impl ManagedInstance {
    pub(crate) fn new(
        provider: Arc<Provider>,
        value: Arc<dyn Any + Send + Sync>,
        dependents: Vec<Arc<ManagedInstance>>,
    ) -> Self {
        Self {
            provider,
            value,
            dependents: Mutex::new(dependents),
            destroyed: AtomicBool::new(false),
        }
    }

    /// The provider this instance was produced by
    pub fn provider(&self) -> &Arc<Provider> {
        &self.provider
    }

    /// The produced value, type-erased
    pub fn value(&self) -> &Arc<dyn Any + Send + Sync> {
        &self.value
    }

    /// Downcast the produced value
    pub fn downcast<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.value.clone().downcast::<T>().ok()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Tear the instance down: dependents first (reverse creation order),
    /// then the instance's own destroyer. Idempotent; a destroyer failure is
    /// logged and teardown continues.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }

        let dependents = match self.dependents.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        for dependent in dependents.iter().rev() {
            dependent.destroy();
        }

        if let Err(error) = self.provider.destroy_value(self.value.as_ref()) {
            warn!(
                provider = self.provider.id(),
                %error,
                "destroyer failed during instance teardown"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::scope::Scope;
    use std::sync::atomic::AtomicUsize;

    fn counting_provider(counter: Arc<AtomicUsize>) -> Arc<Provider> {
        Arc::new(
            Provider::builder::<String>()
                .scope(Scope::Dependent)
                .factory(|_| Ok("value".to_string()))
                .destroyer(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let counter = Arc::new(AtomicUsize::new(0));
        let provider = counting_provider(counter.clone());
        let instance = ManagedInstance::new(
            provider,
            Arc::new("value".to_string()),
            Vec::new(),
        );

        instance.destroy();
        instance.destroy();

        assert!(instance.is_destroyed());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_destroy_cascades_to_dependents() {
        let counter = Arc::new(AtomicUsize::new(0));
        let provider = counting_provider(counter.clone());

        let dependent = Arc::new(ManagedInstance::new(
            provider.clone(),
            Arc::new("dependent".to_string()),
            Vec::new(),
        ));
        let parent = ManagedInstance::new(
            provider,
            Arc::new("parent".to_string()),
            vec![dependent.clone()],
        );

        parent.destroy();

        assert!(dependent.is_destroyed());
        // Both the dependent's and the parent's destroyers ran
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_downcast() {
        let counter = Arc::new(AtomicUsize::new(0));
        let provider = counting_provider(counter);
        let instance =
            ManagedInstance::new(provider, Arc::new("value".to_string()), Vec::new());

        assert_eq!(*instance.downcast::<String>().unwrap(), "value");
        assert!(instance.downcast::<u32>().is_none());
    }
}
