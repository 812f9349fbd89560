use std::any::Any;

use uuid::Uuid;

use crate::container::contract::TypeExpr;
use crate::container::qualifier::{Qualifier, QualifierSet};
use crate::container::resolver::CreationContext;
use crate::container::scope::Scope;
use crate::errors::ContainerError;

/// Factory function producing a provider's value.
///
/// The boxed `Any` must hold the same concrete type callers resolve the
/// provider as. We erase here to keep providers free of type parameters.
pub type ProviderFactory = Box<
    dyn Fn(&CreationContext<'_>) -> Result<Box<dyn Any + Send + Sync>, ContainerError>
        + Send
        + Sync,
>;

/// Teardown callback invoked when a managed instance is destroyed.
pub type ProviderDestroyer =
    Box<dyn Fn(&(dyn Any + Send + Sync)) -> Result<(), ContainerError> + Send + Sync>;

/// A registered producer of one contract.
///
/// Immutable after registration: the registry is built once by an external
/// discovery collaborator and then only read.
pub struct Provider {
    id: String,
    types: Vec<TypeExpr>,
    qualifiers: QualifierSet,
    scope: Scope,
    priority: i32,
    name: Option<String>,
    alternative: bool,
    factory: ProviderFactory,
    destroyer: Option<ProviderDestroyer>,
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("id", &self.id)
            .field("types", &self.types)
            .field("qualifiers", &self.qualifiers)
            .field("scope", &self.scope)
            .field("priority", &self.priority)
            .field("name", &self.name)
            .field("alternative", &self.alternative)
            .finish()
    }
}

impl Provider {
    /// Start building a provider for the contract type `T`.
    ///
    /// The factory given to the builder must produce a value of type `T`;
    /// resolution hands that value back behind `Handle<T>`.
    pub fn builder<T: Send + Sync + 'static>() -> ProviderBuilder<T> {
        ProviderBuilder::new()
    }

    /// Unique provider identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Contract exprs this provider can satisfy
    pub fn types(&self) -> &[TypeExpr] {
        &self.types
    }

    /// Qualifier set, including the built-ins added at build time
    pub fn qualifiers(&self) -> &QualifierSet {
        &self.qualifiers
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Optional name, unique across all named providers
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Whether this provider is an alternative rather than a default
    pub fn is_alternative(&self) -> bool {
        self.alternative
    }

    /// Name of the primary contract type, for diagnostics
    pub fn primary_type_name(&self) -> String {
        self.types
            .first()
            .map(|t| t.type_name())
            .unwrap_or_else(|| "<none>".to_string())
    }

    /// Check if any declared contract is accepted by the requested expr
    pub fn matches_type(&self, requested: &TypeExpr) -> bool {
        self.types.iter().any(|declared| requested.accepts(declared))
    }

    /// Invoke the factory
    pub(crate) fn create(
        &self,
        ctx: &CreationContext<'_>,
    ) -> Result<Box<dyn Any + Send + Sync>, ContainerError> {
        (self.factory)(ctx)
    }

    /// Invoke the destroyer, if one was registered
    pub(crate) fn destroy_value(
        &self,
        value: &(dyn Any + Send + Sync),
    ) -> Result<(), ContainerError> {
        match &self.destroyer {
            Some(destroyer) => destroyer(value),
            None => Ok(()),
        }
    }
}

/// Builder for providers.
pub struct ProviderBuilder<T: Send + Sync + 'static> {
    id: Option<String>,
    types: Vec<TypeExpr>,
    qualifiers: Vec<Qualifier>,
    scope: Scope,
    priority: i32,
    name: Option<String>,
    alternative: bool,
    factory: Option<ProviderFactory>,
    destroyer: Option<ProviderDestroyer>,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> ProviderBuilder<T> {
    fn new() -> Self {
        Self {
            id: None,
            types: vec![TypeExpr::of::<T>()],
            qualifiers: Vec::new(),
            scope: Scope::default(),
            priority: 0,
            name: None,
            alternative: false,
            factory: None,
            destroyer: None,
            _marker: std::marker::PhantomData,
        }
    }

    /// Override the generated identifier
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Declare an additional contract expr this provider satisfies
    pub fn provides(mut self, expr: TypeExpr) -> Self {
        self.types.push(expr);
        self
    }

    /// Add a qualifier
    pub fn qualifier(mut self, qualifier: Qualifier) -> Self {
        self.qualifiers.push(qualifier);
        self
    }

    /// Set the declared scope
    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Set the priority; higher wins during disambiguation
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Give the provider a unique name for name-based lookup
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Mark as an alternative implementation
    pub fn alternative(mut self) -> Self {
        self.alternative = true;
        self
    }

    /// Set the factory function
    pub fn factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&CreationContext<'_>) -> Result<T, ContainerError> + Send + Sync + 'static,
    {
        self.factory = Some(Box::new(move |ctx| {
            let instance = factory(ctx)?;
            Ok(Box::new(instance) as Box<dyn Any + Send + Sync>)
        }));
        self
    }

    /// Set the teardown callback
    pub fn destroyer<F>(mut self, destroyer: F) -> Self
    where
        F: Fn(&T) -> Result<(), ContainerError> + Send + Sync + 'static,
    {
        self.destroyer = Some(Box::new(move |value| match value.downcast_ref::<T>() {
            Some(typed) => destroyer(typed),
            None => Ok(()),
        }));
        self
    }

    /// Build the provider.
    ///
    /// Adds the built-in qualifiers: every provider carries `@Any`, and a
    /// provider with no explicit qualifiers also carries `@Default` so that
    /// unqualified requests match it.
    pub fn build(self) -> Result<Provider, ContainerError> {
        let factory = self.factory.ok_or_else(|| {
            ContainerError::creation_failed(
                std::any::type_name::<T>(),
                "a factory function is required",
            )
        })?;

        let mut qualifiers = QualifierSet::from_slice(&self.qualifiers);
        if qualifiers.is_empty() {
            qualifiers.insert(Qualifier::default_qualifier());
        }
        qualifiers.insert(Qualifier::any());

        let id = self.id.unwrap_or_else(|| {
            format!(
                "{}#{}",
                std::any::type_name::<T>(),
                Uuid::new_v4().simple()
            )
        });

        Ok(Provider {
            id,
            types: self.types,
            qualifiers,
            scope: self.scope,
            priority: self.priority,
            name: self.name,
            alternative: self.alternative,
            factory,
            destroyer: self.destroyer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Greeter;

    #[test]
    fn test_builder_defaults() {
        let provider = Provider::builder::<Greeter>()
            .factory(|_| Ok(Greeter))
            .build()
            .unwrap();

        assert_eq!(provider.scope(), Scope::Dependent);
        assert_eq!(provider.priority(), 0);
        assert!(!provider.is_alternative());
        assert!(provider.name().is_none());
        // Unqualified providers carry @Default and @Any
        assert!(provider.qualifiers().contains(&Qualifier::default_qualifier()));
        assert!(provider.qualifiers().contains(&Qualifier::any()));
    }

    #[test]
    fn test_explicit_qualifiers_suppress_default() {
        let provider = Provider::builder::<Greeter>()
            .qualifier(Qualifier::new("Fast"))
            .factory(|_| Ok(Greeter))
            .build()
            .unwrap();

        assert!(!provider.qualifiers().contains(&Qualifier::default_qualifier()));
        assert!(provider.qualifiers().contains(&Qualifier::any()));
        assert!(provider.qualifiers().contains(&Qualifier::new("Fast")));
    }

    #[test]
    fn test_missing_factory_is_an_error() {
        let result = Provider::builder::<Greeter>().build();
        assert!(result.is_err());
    }

    #[test]
    fn test_type_matching() {
        let provider = Provider::builder::<Greeter>()
            .factory(|_| Ok(Greeter))
            .build()
            .unwrap();

        assert!(provider.matches_type(&TypeExpr::of::<Greeter>()));
        assert!(provider.matches_type(&TypeExpr::wildcard()));
        assert!(!provider.matches_type(&TypeExpr::of::<String>()));
    }
}
