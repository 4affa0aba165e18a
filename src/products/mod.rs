/*!
 * Product Registration and Resolution
 * Declares produced products and caches consumed-product handles per scope
 */

use crate::core::errors::{ConfigurationError, LookupError};
use crate::core::limits::MAX_PRODUCTS_PER_SCOPE;
use crate::core::types::{ProductHandle, ProductId, ScopeKind};
use crate::registry::{HandleResolver, ProductDescription, ProductRegistry};
use crate::unit::ProductDeclarations;
use log::{debug, info, warn};

/// Per-scope registration state and cached lookup results
///
/// Registration runs once at construction; resolution runs once per scope
/// before scheduling begins. Afterwards everything here is read-only, so
/// concurrent lanes fetch inputs without re-resolving names at per-event
/// cost.
#[derive(Debug, Default)]
pub struct ProductRegistrationResolver {
    produced: [Vec<(ProductDescription, ProductId)>; 3],
    must_consume: [Vec<ProductDescription>; 3],
    may_consume: [Vec<ProductDescription>; 3],
    items_to_get: [Vec<ProductHandle>; 3],
    items_may_get: [Vec<ProductHandle>; 3],
    resolved: [bool; 3],
}

impl ProductRegistrationResolver {
    /// Declare every produced product against the shared registry and stash
    /// the consume lists for later resolution
    pub fn register_products(
        declarations: ProductDeclarations,
        registry: &mut dyn ProductRegistry,
    ) -> Result<Self, ConfigurationError> {
        let mut this = Self::default();

        for description in declarations.produced() {
            let bucket = &mut this.produced[description.scope.index()];
            if bucket.len() >= MAX_PRODUCTS_PER_SCOPE {
                return Err(ConfigurationError::InvalidDeclaration(format!(
                    "more than {} produced products declared for {} scope",
                    MAX_PRODUCTS_PER_SCOPE,
                    description.scope
                )));
            }
            let id = registry.register(description)?;
            bucket.push((description.clone(), id));
        }

        for description in declarations.required() {
            this.must_consume[description.scope.index()].push(description.clone());
        }
        for description in declarations.optional() {
            this.may_consume[description.scope.index()].push(description.clone());
        }

        info!(
            "Registered {} produced product(s); awaiting lookup for {} required / {} optional",
            declarations.produced().len(),
            declarations.required().len(),
            declarations.optional().len()
        );
        Ok(this)
    }

    /// Resolve the cached must/may-consume descriptions for one scope
    ///
    /// A required miss is an error; an optional miss yields the absent
    /// sentinel so per-event code can skip it cheaply.
    pub fn update_lookup(
        &mut self,
        scope: ScopeKind,
        resolver: &dyn HandleResolver,
    ) -> Result<(), LookupError> {
        let idx = scope.index();
        let mut to_get = Vec::with_capacity(self.must_consume[idx].len());
        for description in &self.must_consume[idx] {
            match resolver.resolve(scope, description) {
                Some(handle) => to_get.push(handle),
                None => {
                    return Err(LookupError::UnresolvedRequiredProduct {
                        label: description.label.clone(),
                        type_name: description.type_name.clone(),
                        scope,
                    })
                }
            }
        }

        let mut may_get = Vec::with_capacity(self.may_consume[idx].len());
        for description in &self.may_consume[idx] {
            match resolver.resolve(scope, description) {
                Some(handle) => may_get.push(handle),
                None => {
                    warn!(
                        "Optional product '{}' ({}) absent in {} scope",
                        description.label, description.type_name, scope
                    );
                    may_get.push(ProductHandle::ABSENT);
                }
            }
        }

        debug!(
            "Lookup updated for {} scope: {} required, {} optional handle(s)",
            scope,
            to_get.len(),
            may_get.len()
        );
        self.items_to_get[idx] = to_get;
        self.items_may_get[idx] = may_get;
        self.resolved[idx] = true;
        Ok(())
    }

    /// Ordered handles this module must fetch for `scope`
    pub fn items_to_get(&self, scope: ScopeKind) -> &[ProductHandle] {
        &self.items_to_get[scope.index()]
    }

    /// Ordered handles this module may fetch for `scope`; absent sentinels
    /// mark optional products with no producer
    pub fn items_may_get(&self, scope: ScopeKind) -> &[ProductHandle] {
        &self.items_may_get[scope.index()]
    }

    /// Identifiers for this module's produced products in `scope`, in
    /// declaration order
    pub fn produced_ids(&self, scope: ScopeKind) -> Vec<ProductId> {
        self.produced[scope.index()].iter().map(|(_, id)| *id).collect()
    }

    /// Whether handle resolution for `scope` has completed
    pub fn is_resolved(&self, scope: ScopeKind) -> bool {
        // A scope with nothing to consume needs no explicit lookup pass.
        let idx = scope.index();
        self.resolved[idx]
            || (self.must_consume[idx].is_empty() && self.may_consume[idx].is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::InMemoryRegistry;

    fn declarations() -> ProductDeclarations {
        ProductDeclarations::new()
            .produces(ProductDescription::new("hits", "HitCollection", ScopeKind::Event))
            .produces(ProductDescription::new("summary", "Counters", ScopeKind::Run))
            .must_consume(ProductDescription::new("raw", "RawData", ScopeKind::Event))
            .may_consume(ProductDescription::new("noise", "NoiseMap", ScopeKind::Event))
    }

    #[test]
    fn test_register_products_declares_to_registry() {
        let mut registry = InMemoryRegistry::new();
        let resolver =
            ProductRegistrationResolver::register_products(declarations(), &mut registry).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(resolver.produced_ids(ScopeKind::Event).len(), 1);
        assert_eq!(resolver.produced_ids(ScopeKind::Run).len(), 1);
        assert!(resolver.produced_ids(ScopeKind::LuminosityBlock).is_empty());
    }

    #[test]
    fn test_duplicate_declaration_propagates() {
        let mut registry = InMemoryRegistry::new();
        registry
            .register(&ProductDescription::new("hits", "HitCollection", ScopeKind::Event))
            .unwrap();

        let err = ProductRegistrationResolver::register_products(declarations(), &mut registry)
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::DuplicateProduct { .. }));
    }

    #[test]
    fn test_update_lookup_resolves_required_and_optional() {
        let mut registry = InMemoryRegistry::new();
        registry
            .register(&ProductDescription::new("raw", "RawData", ScopeKind::Event))
            .unwrap();
        let mut resolver =
            ProductRegistrationResolver::register_products(declarations(), &mut registry).unwrap();

        // "noise" is never registered: optional miss becomes the sentinel
        resolver.update_lookup(ScopeKind::Event, &registry).unwrap();

        assert_eq!(resolver.items_to_get(ScopeKind::Event).len(), 1);
        assert!(!resolver.items_to_get(ScopeKind::Event)[0].is_absent());
        assert_eq!(resolver.items_may_get(ScopeKind::Event).len(), 1);
        assert!(resolver.items_may_get(ScopeKind::Event)[0].is_absent());
        assert!(resolver.is_resolved(ScopeKind::Event));
    }

    #[test]
    fn test_required_miss_fails_lookup() {
        let mut registry = InMemoryRegistry::new();
        let mut resolver =
            ProductRegistrationResolver::register_products(declarations(), &mut registry).unwrap();

        let err = resolver.update_lookup(ScopeKind::Event, &registry).unwrap_err();
        assert!(matches!(err, LookupError::UnresolvedRequiredProduct { .. }));
        assert!(!resolver.is_resolved(ScopeKind::Event));
    }

    #[test]
    fn test_scope_with_no_consumption_counts_as_resolved() {
        let mut registry = InMemoryRegistry::new();
        let resolver =
            ProductRegistrationResolver::register_products(declarations(), &mut registry).unwrap();

        assert!(resolver.is_resolved(ScopeKind::Run));
        assert!(resolver.is_resolved(ScopeKind::LuminosityBlock));
        assert!(!resolver.is_resolved(ScopeKind::Event));
    }
}
