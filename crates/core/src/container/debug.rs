use serde::Serialize;

use crate::container::container::Container;
use crate::container::context::ContextState;
use crate::errors::ContainerError;

/// Container inspection utilities
#[derive(Debug, Clone)]
pub struct ContainerInspector {
    container: Container,
}

/// Serializable snapshot of the container's registry and live contexts
#[derive(Debug, Clone, Serialize)]
pub struct ContainerInfo {
    pub running: bool,
    pub strict_compatibility: bool,
    pub provider_count: usize,
    pub observer_count: usize,
    pub scopes: Vec<String>,
    pub providers: Vec<ProviderInfo>,
    pub contexts: Vec<ContextInfo>,
}

/// Registration metadata for one provider
#[derive(Debug, Clone, Serialize)]
pub struct ProviderInfo {
    pub id: String,
    pub types: Vec<String>,
    pub qualifiers: Vec<String>,
    pub scope: String,
    pub priority: i32,
    pub name: Option<String>,
    pub alternative: bool,
}

/// State of one live context
#[derive(Debug, Clone, Serialize)]
pub struct ContextInfo {
    pub id: String,
    pub scope: String,
    pub state: String,
    pub instance_count: usize,
}

impl ContainerInspector {
    pub fn new(container: Container) -> Self {
        Self { container }
    }

    /// Snapshot the registry and every live context
    pub fn snapshot(&self) -> Result<ContainerInfo, ContainerError> {
        let providers = self
            .container
            .registry()
            .providers()
            .iter()
            .map(|p| ProviderInfo {
                id: p.id().to_string(),
                types: p.types().iter().map(|t| t.type_name()).collect(),
                qualifiers: p.qualifiers().iter().map(|q| q.to_string()).collect(),
                scope: p.scope().to_string(),
                priority: p.priority(),
                name: p.name().map(|n| n.to_string()),
                alternative: p.is_alternative(),
            })
            .collect();

        let mut contexts = Vec::new();
        for scope in self.container.scopes() {
            for context in self.container.contexts(scope)? {
                contexts.push(ContextInfo {
                    id: context.id().to_string(),
                    scope: scope.to_string(),
                    state: match context.state() {
                        ContextState::Inactive => "inactive".to_string(),
                        ContextState::Active => "active".to_string(),
                        ContextState::Destroyed => "destroyed".to_string(),
                    },
                    instance_count: context.instance_count(),
                });
            }
        }

        Ok(ContainerInfo {
            running: self.container.is_running(),
            strict_compatibility: self.container.strict_compatibility(),
            provider_count: self.container.registry().providers().len(),
            observer_count: self.container.registry().observers().len(),
            scopes: self
                .container
                .scopes()
                .iter()
                .map(|s| s.to_string())
                .collect(),
            providers,
            contexts,
        })
    }

    /// Snapshot rendered as pretty JSON
    pub fn to_json(&self) -> Result<String, ContainerError> {
        let info = self.snapshot()?;
        serde_json::to_string_pretty(&info).map_err(|e| {
            ContainerError::creation_failed("ContainerInfo", e.to_string())
        })
    }
}
