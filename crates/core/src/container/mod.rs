#[allow(clippy::module_inception)]
pub mod container;
pub mod builder;
pub mod contract;
pub mod context;
pub mod context_store;
pub mod debug;
pub mod handle;
pub mod instance;
pub mod managed_context;
pub mod observers;
pub mod provider;
pub mod qualifier;
pub mod registry;
pub mod resolver;
pub mod scope;

pub use builder::ContainerBuilder;
pub use container::Container;
pub use context::{ContextId, ContextState, InstanceContext};
pub use context_store::{ContextStore, ExecutionUnit};
pub use contract::{TypeExpr, TypeKey};
pub use debug::{ContainerInfo, ContainerInspector};
pub use handle::{Handle, InstanceSupplier};
pub use instance::ManagedInstance;
pub use managed_context::ManagedContext;
pub use observers::{ObserverDispatcher, ObserverEntry, ObserverEntryBuilder};
pub use provider::{Provider, ProviderBuilder};
pub use qualifier::{MemberValue, Qualifier, QualifierSet};
pub use registry::{ProviderRegistry, RegistryBuilder};
pub use resolver::{CreationContext, InstanceResolver};
pub use scope::Scope;
