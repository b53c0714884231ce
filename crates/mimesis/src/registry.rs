//! Registry of mapping configurations.

use crate::profile::{MappingConfiguration, MemberPlan, TypePair};
use crate::shape::{Mappable, TypeInfo};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;

/// Errors raised while declaring mappings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("mapping from {source_type} to {destination_type} is already registered")]
    DuplicateMapping {
        source_type: &'static str,
        destination_type: &'static str,
    },

    #[error("custom mapping targets `{property}`, which {type_name} cannot assign")]
    UnknownProperty {
        type_name: &'static str,
        property: String,
    },

    #[error("`{property}` of {type_name} is both ignored and custom-mapped")]
    ConflictingMapping {
        type_name: &'static str,
        property: String,
    },
}

/// Cache key for polymorphic source resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ResolutionKey {
    destination: TypeInfo,
    concrete: TypeInfo,
}

/// Registry of mapping configurations, one per (source, destination) pair.
///
/// Safe to share between threads. Registration is expected to finish before
/// the first mapping request.
#[derive(Default)]
pub struct Registry {
    /// Configurations indexed by type pair.
    configurations: DashMap<TypePair, Arc<MappingConfiguration>>,
    /// Resolved source type per (destination, concrete runtime type).
    resolutions: DashMap<ResolutionKey, TypeInfo>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a configuration.
    ///
    /// A second registration for the same pair fails and leaves the first
    /// one untouched.
    pub fn register(
        &self,
        config: MappingConfiguration,
    ) -> Result<Arc<MappingConfiguration>, ConfigurationError> {
        let pair = config.pair();

        if let Some(property) = config.unknown_custom_targets().next() {
            return Err(ConfigurationError::UnknownProperty {
                type_name: pair.destination.name(),
                property: property.to_string(),
            });
        }

        if let Some(property) = config.ignored_custom_targets().next() {
            return Err(ConfigurationError::ConflictingMapping {
                type_name: pair.destination.name(),
                property: property.to_string(),
            });
        }

        match self.configurations.entry(pair) {
            Entry::Occupied(_) => Err(ConfigurationError::DuplicateMapping {
                source_type: pair.source.name(),
                destination_type: pair.destination.name(),
            }),
            Entry::Vacant(slot) => {
                let config = Arc::new(config);
                slot.insert(Arc::clone(&config));
                tracing::debug!(%pair, "registered mapping configuration");
                Ok(config)
            }
        }
    }

    /// Exact pair lookup. Absence is not an error.
    pub fn lookup(
        &self,
        source: TypeInfo,
        destination: TypeInfo,
    ) -> Option<Arc<MappingConfiguration>> {
        self.configurations
            .get(&TypePair::new(source, destination))
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Which registered source type applies to `instance` when mapping to
    /// `destination`.
    ///
    /// The instance's own type wins; otherwise the first capability it
    /// declares that has a registered mapping. Hits are cached per
    /// (destination, concrete type).
    pub fn resolve_source_type(
        &self,
        destination: TypeInfo,
        instance: &dyn Mappable,
    ) -> Option<TypeInfo> {
        let concrete = instance.type_info();
        let key = ResolutionKey {
            destination,
            concrete,
        };

        if let Some(hit) = self.resolutions.get(&key) {
            return Some(*hit);
        }

        let resolved = if self
            .configurations
            .contains_key(&TypePair::new(concrete, destination))
        {
            Some(concrete)
        } else {
            let shape = instance.shape();
            self.configurations
                .iter()
                .map(|entry| *entry.key())
                .filter(|pair| pair.destination == destination && shape.implements(pair.source))
                .min_by_key(|pair| {
                    shape
                        .capabilities()
                        .iter()
                        .position(|cap| *cap == pair.source)
                })
                .map(|pair| pair.source)
        };

        if let Some(source) = resolved {
            tracing::debug!(
                concrete = %concrete,
                destination = %destination,
                source = %source,
                "resolved polymorphic source type"
            );
            self.resolutions.insert(key, source);
        }

        resolved
    }

    /// Compute the configuration's member plan if it hasn't been yet.
    pub fn finalize<'a>(&self, config: &'a MappingConfiguration) -> &'a MemberPlan {
        config.finalize()
    }

    /// All registered configurations, in no particular order.
    pub fn configurations(&self) -> Vec<Arc<MappingConfiguration>> {
        self.configurations
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Number of registered configurations.
    pub fn len(&self) -> usize {
        self.configurations.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.configurations.is_empty()
    }

    /// Number of cached polymorphic resolutions.
    pub fn resolution_count(&self) -> usize {
        self.resolutions.len()
    }

    /// Drop every configuration and cached resolution.
    pub fn reset(&self) {
        self.configurations.clear();
        self.resolutions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TypeShape, capability, mappable};

    trait Shipped {}
    trait Billed {}

    #[derive(Clone, Default)]
    struct Parcel {
        id: i64,
        weight: u32,
    }

    #[derive(Clone, Default)]
    struct Letter {
        id: i64,
    }

    #[derive(Clone, Default)]
    struct Label {
        id: i64,
        weight: u32,
    }

    mappable!(Parcel { id, weight } implements [dyn Billed, dyn Shipped]);
    mappable!(Letter { id } implements [dyn Shipped]);
    mappable!(Label { id, weight });
    capability!(dyn Shipped { id: i64 });
    capability!(dyn Billed { id: i64 });

    fn make_test_registry() -> Registry {
        let registry = Registry::new();
        registry
            .register(MappingConfiguration::builder::<Parcel, Label>().build())
            .unwrap();
        registry
            .register(MappingConfiguration::builder::<dyn Shipped, Label>().build())
            .unwrap();
        registry
    }

    #[test]
    fn test_duplicate_registration() {
        let registry = make_test_registry();

        let err = registry
            .register(
                MappingConfiguration::builder::<Parcel, Label>()
                    .ignore("weight")
                    .build(),
            )
            .unwrap_err();

        assert!(matches!(err, ConfigurationError::DuplicateMapping { .. }));
        // First registration retained unchanged
        let kept = registry
            .lookup(Parcel::static_shape().info(), Label::static_shape().info())
            .unwrap();
        assert!(!kept.is_ignored("weight"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_unknown_custom_target() {
        let registry = Registry::new();

        let err = registry
            .register(
                MappingConfiguration::builder::<Letter, Label>()
                    .map_from("missing", |l: &Letter| l.id)
                    .build(),
            )
            .unwrap_err();

        assert!(matches!(
            err,
            ConfigurationError::UnknownProperty { ref property, .. } if property == "missing"
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_ignored_custom_target_rejected() {
        let registry = Registry::new();

        let err = registry
            .register(
                MappingConfiguration::builder::<Letter, Label>()
                    .ignore("weight")
                    .map_from("weight", |_: &Letter| 1u32)
                    .build(),
            )
            .unwrap_err();

        assert!(matches!(
            err,
            ConfigurationError::ConflictingMapping { ref property, .. } if property == "weight"
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_configurations_snapshot() {
        let registry = make_test_registry();

        let mut pairs: Vec<_> = registry
            .configurations()
            .iter()
            .map(|c| c.pair().to_string())
            .collect();
        pairs.sort();
        assert_eq!(pairs, vec!["Parcel -> Label", "Shipped -> Label"]);
    }

    #[test]
    fn test_lookup_exact_only() {
        let registry = make_test_registry();

        assert!(
            registry
                .lookup(TypeInfo::of::<Parcel>(), TypeInfo::of::<Label>())
                .is_some()
        );
        // Letter is Shipped, but lookup never consults capabilities
        assert!(
            registry
                .lookup(TypeInfo::of::<Letter>(), TypeInfo::of::<Label>())
                .is_none()
        );
    }

    #[test]
    fn test_resolve_prefers_concrete() {
        let registry = make_test_registry();
        let parcel = Parcel::default();

        let resolved = registry.resolve_source_type(TypeInfo::of::<Label>(), &parcel);
        assert_eq!(resolved, Some(TypeInfo::of::<Parcel>()));
    }

    #[test]
    fn test_resolve_through_capability() {
        let registry = make_test_registry();
        let letter = Letter::default();

        let resolved = registry.resolve_source_type(TypeInfo::of::<Label>(), &letter);
        assert_eq!(resolved, Some(TypeInfo::of::<dyn Shipped>()));
        assert_eq!(registry.resolution_count(), 1);

        // Cached
        registry.resolve_source_type(TypeInfo::of::<Label>(), &letter);
        assert_eq!(registry.resolution_count(), 1);
    }

    #[test]
    fn test_resolve_capability_declaration_order() {
        let registry = Registry::new();
        registry
            .register(MappingConfiguration::builder::<dyn Shipped, Label>().build())
            .unwrap();
        registry
            .register(MappingConfiguration::builder::<dyn Billed, Label>().build())
            .unwrap();

        // Parcel declares Billed before Shipped
        let resolved = registry.resolve_source_type(TypeInfo::of::<Label>(), &Parcel::default());
        assert_eq!(resolved, Some(TypeInfo::of::<dyn Billed>()));
    }

    #[test]
    fn test_resolve_miss() {
        let registry = make_test_registry();

        let resolved = registry.resolve_source_type(TypeInfo::of::<Parcel>(), &Label::default());
        assert_eq!(resolved, None);
        assert_eq!(registry.resolution_count(), 0);
    }

    #[test]
    fn test_reset() {
        let registry = make_test_registry();
        registry.resolve_source_type(TypeInfo::of::<Label>(), &Letter::default());

        registry.reset();
        assert!(registry.is_empty());
        assert_eq!(registry.resolution_count(), 0);
    }
}
