use thiserror::Error;

use crate::container::scope::Scope;

/// Core error type for the lattice container
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("No active context for scope: {scope}")]
    NotActive { scope: Scope },

    #[error("More than one active context for scope '{scope}': {count} active")]
    AmbiguousContext { scope: Scope, count: usize },

    #[error("Ambiguous resolution for '{type_name}': {candidates:?} share the top priority")]
    AmbiguousResolution {
        type_name: String,
        candidates: Vec<String>,
    },

    #[error("Not a recognized qualifier type: {qualifier}")]
    InvalidQualifier { qualifier: String },

    #[error("Unsatisfied dependency: {type_name}")]
    UnsatisfiedDependency { type_name: String },

    #[error("Provider '{provider}' did not produce a value of type {type_name}")]
    TypeMismatch { type_name: String, provider: String },

    #[error("Duplicate provider name: {name}")]
    DuplicateName { name: String },

    #[error("Duplicate provider identifier: {id}")]
    DuplicateProvider { id: String },

    #[error("Scope does not support this operation: {scope}")]
    UnsupportedScope { scope: Scope },

    #[error("Unknown scope: {scope}")]
    UnknownScope { scope: String },

    #[error("Container is not running")]
    NotRunning,

    #[error("Lock error on resource: {resource}")]
    LockError { resource: String },

    #[error("Creation of '{type_name}' failed: {message}")]
    CreationFailed { type_name: String, message: String },
}

impl ContainerError {
    /// Create a new not-active error for a scope
    pub fn not_active(scope: Scope) -> Self {
        Self::NotActive { scope }
    }

    /// Create a new ambiguous-context error
    pub fn ambiguous_context(scope: Scope, count: usize) -> Self {
        Self::AmbiguousContext { scope, count }
    }

    /// Create a new ambiguous-resolution error
    pub fn ambiguous_resolution(type_name: impl Into<String>, candidates: Vec<String>) -> Self {
        Self::AmbiguousResolution {
            type_name: type_name.into(),
            candidates,
        }
    }

    /// Create a new invalid-qualifier error
    pub fn invalid_qualifier(qualifier: impl Into<String>) -> Self {
        Self::InvalidQualifier {
            qualifier: qualifier.into(),
        }
    }

    /// Create a new creation-failed error
    pub fn creation_failed(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CreationFailed {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// Create a new lock error
    pub fn lock(resource: impl Into<String>) -> Self {
        Self::LockError {
            resource: resource.into(),
        }
    }

    /// Check if the error is a not-active error
    pub fn is_not_active(&self) -> bool {
        matches!(self, Self::NotActive { .. })
    }

    /// Check if the error reports an ambiguity (context or resolution)
    pub fn is_ambiguous(&self) -> bool {
        matches!(
            self,
            Self::AmbiguousContext { .. } | Self::AmbiguousResolution { .. }
        )
    }

    /// Check if the error is a qualifier error
    pub fn is_invalid_qualifier(&self) -> bool {
        matches!(self, Self::InvalidQualifier { .. })
    }
}
