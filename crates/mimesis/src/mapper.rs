//! Mapper: the entry point that runs a full mapping call.
//!
//! A mapping call looks up (or resolves) the configuration for its type
//! pair, then runs, in order: the generated scalar mapper, custom mappings,
//! collection members, and the post-mapping hook.

use crate::collection::CollectionMapper;
use crate::config::MapperConfig;
use crate::generated::GeneratedMapperCache;
use crate::profile::{MappingConfiguration, Profile, Registrar};
use crate::registry::{ConfigurationError, Registry};
use crate::shape::{Mappable, TypeInfo};
use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::sync::{Arc, LazyLock};

/// Errors that can occur while mapping.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("no mapping configured from {source_type} to {destination_type}")]
    NoMapping {
        source_type: &'static str,
        destination_type: &'static str,
    },

    #[error("property `{property}` of {type_name} rejected the mapped value")]
    IncompatibleValue {
        type_name: &'static str,
        property: &'static str,
    },

    #[error("{0} has no zero-argument constructor")]
    NotConstructible(&'static str),

    #[error("collection element {source_type} has no mapping to {destination_type}")]
    UnmappedElement {
        source_type: &'static str,
        destination_type: &'static str,
    },
}

/// Snapshot of the mapper's caches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapperStats {
    /// Registered configurations.
    pub configurations: usize,
    /// Generated scalar mappers built so far.
    pub generated_mappers: usize,
    /// Cached polymorphic source resolutions.
    pub type_resolutions: usize,
}

static GLOBAL: LazyLock<Mapper> = LazyLock::new(Mapper::new);

/// Maps values between registered type pairs.
///
/// All state is behind concurrent maps, so one mapper can serve any number
/// of threads. Nothing runs in the background.
#[derive(Default)]
pub struct Mapper {
    registry: Registry,
    generated: GeneratedMapperCache,
    config: MapperConfig,
}

impl Mapper {
    /// Create an empty mapper with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty mapper with the given settings.
    pub fn with_config(config: MapperConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// The process-wide mapper.
    pub fn global() -> &'static Mapper {
        &GLOBAL
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Register one configuration, merging any ignores from [`MapperConfig`].
    pub fn register(
        &self,
        mut config: MappingConfiguration,
    ) -> Result<Arc<MappingConfiguration>, ConfigurationError> {
        let overrides: Vec<String> = self
            .config
            .ignored_for(&config.pair())
            .map(str::to_string)
            .collect();
        config.extend_ignored(overrides.iter().map(String::as_str));
        self.registry.register(config)
    }

    /// Register every configuration a profile declares.
    ///
    /// Stops at the first failure; earlier registrations stay.
    pub fn add_profile(&self, profile: &dyn Profile) -> Result<usize, ConfigurationError> {
        let mut registrar = Registrar::new();
        profile.configure(&mut registrar);

        let configurations = registrar.into_configurations();
        let count = configurations.len();
        for config in configurations {
            self.register(config)?;
        }
        Ok(count)
    }

    /// Map `source` into a new `D`, using the configuration for `(S, D)`.
    pub fn map<S, D>(&self, source: &S) -> Result<D, MapError>
    where
        S: Mappable,
        D: Mappable + Default,
    {
        let mut destination = D::default();
        self.map_into(source, &mut destination)?;
        Ok(destination)
    }

    /// Map `source` into an existing `destination`.
    pub fn map_into<S, D>(&self, source: &S, destination: &mut D) -> Result<(), MapError>
    where
        S: Mappable,
        D: Mappable,
    {
        let (source_type, destination_type) = (TypeInfo::of::<S>(), TypeInfo::of::<D>());
        let config = self
            .registry
            .lookup(source_type, destination_type)
            .ok_or(MapError::NoMapping {
                source_type: source_type.name(),
                destination_type: destination_type.name(),
            })?;
        self.apply(&config, source, destination)
    }

    /// Map a source whose type is only known at runtime.
    ///
    /// `None` maps to `None`.
    pub fn map_dyn<D>(&self, source: Option<&dyn Mappable>) -> Result<Option<D>, MapError>
    where
        D: Mappable + Default,
    {
        let Some(source) = source else {
            return Ok(None);
        };
        let config = self.resolve(source, TypeInfo::of::<D>())?;
        let mut destination = D::default();
        self.apply(&config, source, &mut destination)?;
        Ok(Some(destination))
    }

    /// Map a runtime-typed source into an existing `destination`.
    ///
    /// Returns `false` without touching `destination` when `source` is `None`.
    /// Only writable destination properties are assigned.
    pub fn map_dyn_into<D>(
        &self,
        source: Option<&dyn Mappable>,
        destination: &mut D,
    ) -> Result<bool, MapError>
    where
        D: Mappable,
    {
        let Some(source) = source else {
            return Ok(false);
        };
        let config = self.resolve(source, TypeInfo::of::<D>())?;
        self.apply(&config, source, destination)?;
        Ok(true)
    }

    /// Lazily map a sequence of runtime-typed sources.
    ///
    /// `None` entries are skipped. The first failure is yielded and ends the
    /// sequence.
    pub fn map_sequence<'a, D, I>(&'a self, sources: I) -> MapSequence<'a, I::IntoIter, D>
    where
        I: IntoIterator<Item = Option<&'a dyn Mappable>>,
        D: Mappable + Default,
    {
        MapSequence {
            mapper: self,
            sources: sources.into_iter(),
            done: false,
            _marker: PhantomData,
        }
    }

    /// Clear every configuration and cache. Intended for test isolation.
    pub fn reset(&self) {
        self.registry.reset();
        self.generated.clear();
        tracing::debug!("mapper reset");
    }

    pub fn stats(&self) -> MapperStats {
        MapperStats {
            configurations: self.registry.len(),
            generated_mappers: self.generated.len(),
            type_resolutions: self.registry.resolution_count(),
        }
    }

    fn resolve(
        &self,
        source: &dyn Mappable,
        destination: TypeInfo,
    ) -> Result<Arc<MappingConfiguration>, MapError> {
        self.registry
            .resolve_source_type(destination, source)
            .and_then(|resolved| self.registry.lookup(resolved, destination))
            .ok_or_else(|| {
                let source_type = source.type_info();
                tracing::warn!(
                    source = %source_type,
                    destination = %destination,
                    "no mapping for runtime source type"
                );
                MapError::NoMapping {
                    source_type: source_type.name(),
                    destination_type: destination.name(),
                }
            })
    }

    /// Run one configuration against an already constructed destination.
    pub(crate) fn apply(
        &self,
        config: &MappingConfiguration,
        source: &dyn Mappable,
        destination: &mut dyn Mappable,
    ) -> Result<(), MapError> {
        let plan = self.registry.finalize(config);

        self.generated.get(config).apply(source, destination)?;

        for member in &plan.custom {
            let value = (member.expr)(source);
            if !member.destination.write(destination, value) {
                return Err(MapError::IncompatibleValue {
                    type_name: config.pair().destination.name(),
                    property: member.destination.name(),
                });
            }
        }

        let collections = CollectionMapper::new(self);
        for member in &plan.collections {
            collections.map_member(member, source, destination)?;
        }

        if let Some(hook) = config.after_map() {
            hook(source, destination);
        }

        Ok(())
    }
}

/// Lazy sequence returned by [`Mapper::map_sequence`].
pub struct MapSequence<'a, I, D> {
    mapper: &'a Mapper,
    sources: I,
    done: bool,
    _marker: PhantomData<fn() -> D>,
}

impl<'a, I, D> Iterator for MapSequence<'a, I, D>
where
    I: Iterator<Item = Option<&'a dyn Mappable>>,
    D: Mappable + Default,
{
    type Item = Result<D, MapError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let Some(source) = self.sources.next() else {
                self.done = true;
                return None;
            };
            match self.mapper.map_dyn::<D>(source) {
                Ok(Some(destination)) => return Some(Ok(destination)),
                Ok(None) => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

impl<'a, I, D> FusedIterator for MapSequence<'a, I, D>
where
    I: Iterator<Item = Option<&'a dyn Mappable>>,
    D: Mappable + Default,
{
}
