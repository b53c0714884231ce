//! Generated mappers: cached scalar-copy procedures, one per type pair.
//!
//! A generated mapper binds each scalar source accessor to its destination
//! writer once, so a mapping call never looks a property up by name.
//! Collections, custom mappings and hooks are handled by the caller.

use crate::mapper::MapError;
use crate::profile::{MappingConfiguration, MemberPair, TypePair};
use crate::shape::Mappable;
use dashmap::DashMap;
use std::sync::Arc;

/// A scalar-copy procedure for one finalized configuration.
#[derive(Debug)]
pub struct GeneratedMapper {
    pair: TypePair,
    assignments: Box<[MemberPair]>,
}

impl GeneratedMapper {
    /// Bind the configuration's scalar members, finalizing it first if needed.
    pub fn synthesize(config: &MappingConfiguration) -> Self {
        let plan = config.finalize();
        Self {
            pair: config.pair(),
            assignments: plan.scalars.clone().into_boxed_slice(),
        }
    }

    /// Type pair of the configuration this mapper was built from.
    pub fn pair(&self) -> TypePair {
        self.pair
    }

    /// Number of scalar assignments performed per call.
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Copy every scalar member from `source` into `destination`.
    ///
    /// Members the source cannot produce are skipped. Assignments made before
    /// a rejected value stay in place.
    pub fn apply(
        &self,
        source: &dyn Mappable,
        destination: &mut dyn Mappable,
    ) -> Result<(), MapError> {
        for assignment in self.assignments.iter() {
            let Some(value) = assignment.source.read(source) else {
                continue;
            };
            if !assignment.destination.write(destination, value) {
                return Err(MapError::IncompatibleValue {
                    type_name: self.pair.destination.name(),
                    property: assignment.destination.name(),
                });
            }
        }
        Ok(())
    }
}

/// Process-wide cache of generated mappers.
#[derive(Debug, Default)]
pub struct GeneratedMapperCache {
    mappers: DashMap<TypePair, Arc<GeneratedMapper>>,
}

impl GeneratedMapperCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The canonical mapper for `config`, synthesizing it on first request.
    ///
    /// Racing callers may each synthesize one; the first inserted wins and
    /// every caller gets that one.
    pub fn get(&self, config: &MappingConfiguration) -> Arc<GeneratedMapper> {
        let pair = config.pair();
        if let Some(cached) = self.mappers.get(&pair) {
            return Arc::clone(cached.value());
        }

        let synthesized = Arc::new(GeneratedMapper::synthesize(config));
        let canonical = Arc::clone(self.mappers.entry(pair).or_insert(synthesized).value());
        tracing::debug!(%pair, assignments = canonical.len(), "generated scalar mapper");
        canonical
    }

    pub fn len(&self) -> usize {
        self.mappers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappers.is_empty()
    }

    pub fn clear(&self) {
        self.mappers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mappable;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Sensor {
        id: u32,
        label: String,
        reading: f64,
        history: Vec<f64>,
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    struct SensorRow {
        id: u32,
        label: String,
        reading: f32,
        history: Vec<f64>,
    }

    mappable!(Sensor { id, label, reading, history });
    mappable!(SensorRow { id, label, reading, history });

    #[test]
    fn test_copies_only_scalars() {
        let config = MappingConfiguration::builder::<Sensor, SensorRow>().build();
        let mapper = GeneratedMapper::synthesize(&config);

        let source = Sensor {
            id: 4,
            label: "boiler".into(),
            reading: 81.5,
            history: vec![80.0, 81.0],
        };
        let mut row = SensorRow::default();
        mapper.apply(&source, &mut row).unwrap();

        assert!(config.is_finalized());
        assert_eq!(mapper.pair(), config.pair());
        assert_eq!(mapper.len(), 2);
        assert_eq!(row.id, 4);
        assert_eq!(row.label, "boiler");
        // f64 vs f32 is not an exact match, history is a collection
        assert_eq!(row.reading, 0.0);
        assert!(row.history.is_empty());
    }

    #[test]
    fn test_cache_returns_canonical_mapper() {
        let cache = GeneratedMapperCache::new();
        let config = MappingConfiguration::builder::<Sensor, SensorRow>().build();

        let first = cache.get(&config);
        let second = cache.get(&config);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_first_use() {
        let cache = GeneratedMapperCache::new();
        let config = MappingConfiguration::builder::<Sensor, SensorRow>().build();

        let mappers: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8).map(|_| scope.spawn(|| cache.get(&config))).collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(mappers.iter().all(|m| Arc::ptr_eq(m, &mappers[0])));
        assert_eq!(cache.len(), 1);
    }
}
