pub mod errors;
pub mod container;

// Re-export key types for convenience (specific exports to avoid ambiguity)
pub use container::{
    Container, ContainerBuilder, ContainerInspector, ContextId, ContextState, ExecutionUnit,
    Handle, InstanceContext, InstanceSupplier, ManagedContext, ManagedInstance, ObserverDispatcher,
    ObserverEntry, Provider, ProviderRegistry, Qualifier, QualifierSet, Scope, TypeExpr, TypeKey,
};
pub use errors::ContainerError;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get crate version
pub fn version() -> &'static str {
    VERSION
}
