/*!
 * Product Registry
 * Registration of produced products and resolution of consumed-product handles
 *
 * The registry storage engine itself is an external collaborator; this module
 * defines the narrow interfaces the adaptor consumes plus an in-memory
 * implementation usable stand-alone and in tests.
 */

use crate::core::errors::ConfigurationError;
use crate::core::types::{ProductHandle, ProductId, ScopeKind};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Logical description of a named, typed product within one scope
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProductDescription {
    pub label: String,
    pub type_name: String,
    pub scope: ScopeKind,
}

impl ProductDescription {
    pub fn new(label: impl Into<String>, type_name: impl Into<String>, scope: ScopeKind) -> Self {
        Self {
            label: label.into(),
            type_name: type_name.into(),
            scope,
        }
    }
}

/// Shared registry of declared products
///
/// Mutated only during the single-threaded registration phase before
/// scheduling starts.
pub trait ProductRegistry: Send {
    /// Declare a product, yielding the identifier its committed items carry
    fn register(&mut self, description: &ProductDescription) -> Result<ProductId, ConfigurationError>;
}

/// Resolves a consumed-product description to its storage slot
///
/// Read-only after the registration phase, safe for concurrent lookup.
pub trait HandleResolver: Send + Sync {
    /// Returns `None` when no matching product is registered
    fn resolve(&self, scope: ScopeKind, description: &ProductDescription) -> Option<ProductHandle>;
}

/// In-memory registry implementing both registration and resolution
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    entries: Vec<ProductDescription>,
    // The description is its own uniqueness key, so lookups stay
    // allocation-free on the resolve path.
    by_key: HashMap<ProductDescription, ProductId>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ProductRegistry for InMemoryRegistry {
    fn register(&mut self, description: &ProductDescription) -> Result<ProductId, ConfigurationError> {
        if description.label.is_empty() || description.type_name.is_empty() {
            return Err(ConfigurationError::InvalidDeclaration(
                "product label and type must be non-empty".into(),
            ));
        }
        if self.by_key.contains_key(description) {
            return Err(ConfigurationError::DuplicateProduct {
                label: description.label.clone(),
                type_name: description.type_name.clone(),
                scope: description.scope,
            });
        }
        let id = self.entries.len() as ProductId;
        self.entries.push(description.clone());
        self.by_key.insert(description.clone(), id);
        debug!(
            "Registered product '{}' ({}) for {} scope as id {}",
            description.label, description.type_name, description.scope, id
        );
        Ok(id)
    }
}

impl HandleResolver for InMemoryRegistry {
    fn resolve(&self, scope: ScopeKind, description: &ProductDescription) -> Option<ProductHandle> {
        if description.scope != scope {
            return None;
        }
        self.by_key.get(description).map(|id| ProductHandle::new(*id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_assigns_sequential_ids() {
        let mut reg = InMemoryRegistry::new();
        let a = ProductDescription::new("hits", "HitCollection", ScopeKind::Event);
        let b = ProductDescription::new("tracks", "TrackCollection", ScopeKind::Event);

        assert_eq!(reg.register(&a).unwrap(), 0);
        assert_eq!(reg.register(&b).unwrap(), 1);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut reg = InMemoryRegistry::new();
        let desc = ProductDescription::new("hits", "HitCollection", ScopeKind::Event);
        reg.register(&desc).unwrap();

        let err = reg.register(&desc).unwrap_err();
        assert!(matches!(err, ConfigurationError::DuplicateProduct { .. }));
    }

    #[test]
    fn test_same_label_different_scope_allowed() {
        let mut reg = InMemoryRegistry::new();
        reg.register(&ProductDescription::new("summary", "Counters", ScopeKind::Run))
            .unwrap();
        reg.register(&ProductDescription::new(
            "summary",
            "Counters",
            ScopeKind::LuminosityBlock,
        ))
        .unwrap();
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_empty_label_rejected() {
        let mut reg = InMemoryRegistry::new();
        let err = reg
            .register(&ProductDescription::new("", "HitCollection", ScopeKind::Event))
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidDeclaration(_)));
    }

    #[test]
    fn test_resolve_matches_registered_entry() {
        let mut reg = InMemoryRegistry::new();
        let desc = ProductDescription::new("hits", "HitCollection", ScopeKind::Event);
        let id = reg.register(&desc).unwrap();

        let handle = reg.resolve(ScopeKind::Event, &desc).unwrap();
        assert_eq!(handle.raw(), id);
        assert!(!handle.is_absent());
    }

    #[test]
    fn test_resolve_miss_and_scope_mismatch() {
        let mut reg = InMemoryRegistry::new();
        let desc = ProductDescription::new("hits", "HitCollection", ScopeKind::Event);
        reg.register(&desc).unwrap();

        let missing = ProductDescription::new("ghost", "HitCollection", ScopeKind::Event);
        assert!(reg.resolve(ScopeKind::Event, &missing).is_none());
        assert!(reg.resolve(ScopeKind::Run, &desc).is_none());
    }
}
