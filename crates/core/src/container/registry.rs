use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::container::contract::TypeExpr;
use crate::container::observers::ObserverEntry;
use crate::container::provider::Provider;
use crate::container::qualifier::{Qualifier, QualifierSet};
use crate::errors::ContainerError;

/// Process-wide index of providers and observers.
///
/// Built once during an explicit initialization phase and never mutated
/// afterwards, so queries are pure reads needing no locking. Tests construct
/// isolated registries; there is no ambient singleton.
pub struct ProviderRegistry {
    providers: Vec<Arc<Provider>>,
    by_name: HashMap<String, Arc<Provider>>,
    by_id: HashMap<String, Arc<Provider>>,
    observers: Vec<Arc<ObserverEntry>>,
    qualifier_types: HashSet<String>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.providers.len())
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl ProviderRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// All registered providers, in registration order
    pub fn providers(&self) -> &[Arc<Provider>] {
        &self.providers
    }

    /// All registered observers, in registration order
    pub fn observers(&self) -> &[Arc<ObserverEntry>] {
        &self.observers
    }

    /// Candidates for a contract: every provider whose declared types are
    /// accepted by the request and whose qualifier set superset-matches the
    /// requested qualifiers. An unqualified request implies `@Default`.
    ///
    /// Sorted by priority descending; a priority tie preserves registration
    /// order. Zero candidates is an empty result, never an error.
    pub fn find(
        &self,
        requested: &TypeExpr,
        qualifiers: &QualifierSet,
    ) -> Result<Vec<Arc<Provider>>, ContainerError> {
        self.check_qualifiers(qualifiers)?;

        let effective;
        let requested_qualifiers = if qualifiers.is_empty() {
            effective = QualifierSet::from_slice(&[Qualifier::default_qualifier()]);
            &effective
        } else {
            qualifiers
        };

        let mut candidates: Vec<Arc<Provider>> = self
            .providers
            .iter()
            .filter(|p| p.matches_type(requested))
            .filter(|p| p.qualifiers().contains_all(requested_qualifiers))
            .cloned()
            .collect();
        candidates.sort_by(|a, b| b.priority().cmp(&a.priority()));
        Ok(candidates)
    }

    /// Look up a provider by its unique name.
    ///
    /// Ambiguous names are rejected at build time, so this either resolves
    /// or reports "no match" as `None` — never an error.
    pub fn find_by_name(&self, name: &str) -> Option<Arc<Provider>> {
        self.by_name.get(name).cloned()
    }

    /// Look up a provider by identifier
    pub fn provider_by_id(&self, id: &str) -> Option<Arc<Provider>> {
        self.by_id.get(id).cloned()
    }

    /// Ordered observers for an event type + qualifier set.
    ///
    /// Priority descending, registration order on ties, so repeated queries
    /// are reproducible.
    pub fn observers_for(
        &self,
        event_type: &TypeExpr,
        qualifiers: &QualifierSet,
    ) -> Result<Vec<Arc<ObserverEntry>>, ContainerError> {
        self.check_qualifiers(qualifiers)?;

        let mut matched: Vec<Arc<ObserverEntry>> = self
            .observers
            .iter()
            .filter(|o| o.matches(event_type, qualifiers))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.priority().cmp(&a.priority()));
        Ok(matched)
    }

    /// Disambiguate candidates down to at most one winner.
    ///
    /// Unless strict compatibility mode is on, alternatives outrank default
    /// providers. The remaining candidates compete on priority; a shared top
    /// priority is reported as ambiguous, never guessed.
    pub fn select_unique(
        &self,
        candidates: &[Arc<Provider>],
        strict: bool,
    ) -> Result<Option<Arc<Provider>>, ContainerError> {
        match candidates {
            [] => return Ok(None),
            [single] => return Ok(Some(single.clone())),
            _ => {}
        }

        let eligible: Vec<Arc<Provider>> =
            if !strict && candidates.iter().any(|p| p.is_alternative()) {
                candidates
                    .iter()
                    .filter(|p| p.is_alternative())
                    .cloned()
                    .collect()
            } else {
                candidates.to_vec()
            };

        if eligible.len() == 1 {
            return Ok(Some(eligible[0].clone()));
        }

        let top = eligible.iter().map(|p| p.priority()).max().unwrap();
        let tied: Vec<Arc<Provider>> = eligible
            .into_iter()
            .filter(|p| p.priority() == top)
            .collect();
        if tied.len() == 1 {
            Ok(Some(tied[0].clone()))
        } else {
            Err(ContainerError::ambiguous_resolution(
                tied[0].primary_type_name(),
                tied.iter().map(|p| p.id().to_string()).collect(),
            ))
        }
    }

    fn check_qualifiers(&self, qualifiers: &QualifierSet) -> Result<(), ContainerError> {
        for qualifier in qualifiers.iter() {
            if !self.qualifier_types.contains(qualifier.name()) {
                return Err(ContainerError::invalid_qualifier(qualifier.to_string()));
            }
        }
        Ok(())
    }
}

/// Single-writer build phase for the registry.
pub struct RegistryBuilder {
    providers: Vec<Arc<Provider>>,
    observers: Vec<Arc<ObserverEntry>>,
    qualifier_types: HashSet<String>,
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryBuilder {
    pub fn new() -> Self {
        let mut qualifier_types = HashSet::new();
        qualifier_types.insert("Default".to_string());
        qualifier_types.insert("Any".to_string());
        Self {
            providers: Vec::new(),
            observers: Vec::new(),
            qualifier_types,
        }
    }

    /// Register a provider
    pub fn register(mut self, provider: Provider) -> Self {
        for qualifier in provider.qualifiers().iter() {
            self.qualifier_types.insert(qualifier.name().to_string());
        }
        self.providers.push(Arc::new(provider));
        self
    }

    /// Register an observer entry
    pub fn register_observer(mut self, entry: ObserverEntry) -> Self {
        for qualifier in entry.qualifiers().iter() {
            self.qualifier_types.insert(qualifier.name().to_string());
        }
        self.observers.push(Arc::new(entry));
        self
    }

    /// Declare a qualifier type that appears in requests but on no provider
    pub fn qualifier_type(mut self, name: impl Into<String>) -> Self {
        self.qualifier_types.insert(name.into());
        self
    }

    /// Freeze the registry.
    ///
    /// Verifies name and identifier uniqueness; after this the registry is
    /// read-only.
    pub fn build(self) -> Result<ProviderRegistry, ContainerError> {
        let mut by_name = HashMap::new();
        let mut by_id = HashMap::new();

        for provider in &self.providers {
            if by_id
                .insert(provider.id().to_string(), provider.clone())
                .is_some()
            {
                return Err(ContainerError::DuplicateProvider {
                    id: provider.id().to_string(),
                });
            }
            if let Some(name) = provider.name() {
                if by_name.insert(name.to_string(), provider.clone()).is_some() {
                    return Err(ContainerError::DuplicateName {
                        name: name.to_string(),
                    });
                }
            }
        }

        debug!(
            providers = self.providers.len(),
            observers = self.observers.len(),
            "provider registry built"
        );
        Ok(ProviderRegistry {
            providers: self.providers,
            by_name,
            by_id,
            observers: self.observers,
            qualifier_types: self.qualifier_types,
        })
    }
}
