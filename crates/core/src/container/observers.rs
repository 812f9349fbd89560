use std::any::Any;
use std::sync::Arc;

use tracing::trace;

use crate::container::contract::TypeExpr;
use crate::container::qualifier::{Qualifier, QualifierSet};
use crate::container::registry::ProviderRegistry;
use crate::errors::ContainerError;

/// Callback invoked with a type-erased event payload.
pub type ObserverCallback = Box<dyn Fn(&(dyn Any + Send + Sync)) + Send + Sync>;

/// A registered observer of one event type.
///
/// Immutable after registration. The entry matches an event when its
/// observed type accepts the fired event type and every one of its
/// qualifiers is carried by the event.
pub struct ObserverEntry {
    event_type: TypeExpr,
    qualifiers: QualifierSet,
    priority: i32,
    callback: ObserverCallback,
}

impl std::fmt::Debug for ObserverEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverEntry")
            .field("event_type", &self.event_type)
            .field("qualifiers", &self.qualifiers)
            .field("priority", &self.priority)
            .finish()
    }
}

impl ObserverEntry {
    /// Start building an observer of events of type `T`
    pub fn observe<T: Send + Sync + 'static>() -> ObserverEntryBuilder<T> {
        ObserverEntryBuilder::new()
    }

    pub fn event_type(&self) -> &TypeExpr {
        &self.event_type
    }

    pub fn qualifiers(&self) -> &QualifierSet {
        &self.qualifiers
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Check whether this entry should receive an event of the given type
    /// and qualifiers
    pub fn matches(&self, event_type: &TypeExpr, event_qualifiers: &QualifierSet) -> bool {
        self.event_type.accepts(event_type) && event_qualifiers.contains_all(&self.qualifiers)
    }

    /// Deliver an event payload to the callback.
    ///
    /// Invocation belongs to the event-firing collaborator; the container
    /// only hands out ordered entries.
    pub fn notify(&self, event: &(dyn Any + Send + Sync)) {
        (self.callback)(event);
    }
}

/// Builder for observer entries.
pub struct ObserverEntryBuilder<T: Send + Sync + 'static> {
    event_type: TypeExpr,
    qualifiers: Vec<Qualifier>,
    priority: i32,
    callback: Option<ObserverCallback>,
    _marker: std::marker::PhantomData<fn(&T)>,
}

impl<T: Send + Sync + 'static> ObserverEntryBuilder<T> {
    fn new() -> Self {
        Self {
            event_type: TypeExpr::of::<T>(),
            qualifiers: Vec::new(),
            priority: 0,
            callback: None,
            _marker: std::marker::PhantomData,
        }
    }

    /// Observe a wider contract than the exact event type
    pub fn event_expr(mut self, expr: TypeExpr) -> Self {
        self.event_type = expr;
        self
    }

    /// Require a qualifier on delivered events
    pub fn qualifier(mut self, qualifier: Qualifier) -> Self {
        self.qualifiers.push(qualifier);
        self
    }

    /// Set the priority; higher runs earlier
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the typed callback
    pub fn handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.callback = Some(Box::new(move |event| {
            if let Some(typed) = event.downcast_ref::<T>() {
                handler(typed);
            }
        }));
        self
    }

    /// Build the observer entry
    pub fn build(self) -> Result<ObserverEntry, ContainerError> {
        let callback = self.callback.ok_or_else(|| {
            ContainerError::creation_failed(
                std::any::type_name::<T>(),
                "an observer handler is required",
            )
        })?;
        Ok(ObserverEntry {
            event_type: self.event_type,
            qualifiers: QualifierSet::from_slice(&self.qualifiers),
            priority: self.priority,
            callback,
        })
    }
}

/// Matches fired events against the registry's observer index.
///
/// Produces a deterministically ordered dispatch list: priority descending,
/// ties broken by registration order. Never invokes observers itself.
#[derive(Debug, Clone)]
pub struct ObserverDispatcher {
    registry: Arc<ProviderRegistry>,
}

impl ObserverDispatcher {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }

    /// Ordered observers for an event type + qualifier set
    pub fn observers_for(
        &self,
        event_type: &TypeExpr,
        qualifiers: &[Qualifier],
    ) -> Result<Vec<Arc<ObserverEntry>>, ContainerError> {
        let resolved = self
            .registry
            .observers_for(event_type, &QualifierSet::from_slice(qualifiers))?;
        trace!(
            event = %event_type.type_name(),
            count = resolved.len(),
            "resolved observer dispatch list"
        );
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct OrderPlaced {
        total: u32,
    }

    #[test]
    fn test_typed_handler_receives_event() {
        let seen = Arc::new(AtomicUsize::new(0));
        let entry = ObserverEntry::observe::<OrderPlaced>()
            .handler({
                let seen = seen.clone();
                move |event: &OrderPlaced| {
                    seen.fetch_add(event.total as usize, Ordering::SeqCst);
                }
            })
            .build()
            .unwrap();

        entry.notify(&OrderPlaced { total: 7 });
        // Payloads of a different type are ignored rather than panicking
        entry.notify(&"not an order".to_string());

        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn test_matching_rules() {
        let entry = ObserverEntry::observe::<OrderPlaced>()
            .qualifier(Qualifier::new("Priority"))
            .handler(|_: &OrderPlaced| {})
            .build()
            .unwrap();

        let with = QualifierSet::from_slice(&[Qualifier::new("Priority")]);
        let without = QualifierSet::new();

        assert!(entry.matches(&TypeExpr::of::<OrderPlaced>(), &with));
        // The event must carry every observer qualifier
        assert!(!entry.matches(&TypeExpr::of::<OrderPlaced>(), &without));
        assert!(!entry.matches(&TypeExpr::of::<String>(), &with));
    }

    #[test]
    fn test_unqualified_observer_matches_any_event_qualifiers() {
        let entry = ObserverEntry::observe::<OrderPlaced>()
            .handler(|_: &OrderPlaced| {})
            .build()
            .unwrap();

        let decorated = QualifierSet::from_slice(&[Qualifier::new("Priority")]);
        assert!(entry.matches(&TypeExpr::of::<OrderPlaced>(), &decorated));
    }

    #[test]
    fn test_handler_is_required() {
        assert!(ObserverEntry::observe::<OrderPlaced>().build().is_err());
    }
}
