//! Mapping configurations and the profiles that declare them.

use crate::shape::{
    ElementType, FieldShape, Mappable, PropertyDescriptor, Shape, TypeInfo, TypeShape,
};
use crate::value::{FieldValue, Value};
use indexmap::{IndexMap, IndexSet};
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};

/// Computes a destination property from the whole source.
pub type CustomMapping = Arc<dyn Fn(&dyn Mappable) -> Value + Send + Sync>;

/// Runs after all properties have been assigned.
pub type AfterMap = Arc<dyn Fn(&dyn Mappable, &mut dyn Mappable) + Send + Sync>;

/// Identity of a mapping configuration: (source type, destination type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypePair {
    pub source: TypeInfo,
    pub destination: TypeInfo,
}

impl TypePair {
    pub fn new(source: TypeInfo, destination: TypeInfo) -> Self {
        Self {
            source,
            destination,
        }
    }

    pub fn of<S: ?Sized + 'static, D: ?Sized + 'static>() -> Self {
        Self::new(TypeInfo::of::<S>(), TypeInfo::of::<D>())
    }
}

impl fmt::Display for TypePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.destination)
    }
}

/// How one source type populates one destination type.
///
/// Declared once at startup. The member plan is computed on first use and
/// never changes afterwards.
pub struct MappingConfiguration {
    pair: TypePair,
    source_shape: &'static Shape,
    destination_shape: &'static Shape,
    ignored: IndexSet<String>,
    custom: IndexMap<String, CustomMapping>,
    after_map: Option<AfterMap>,
    plan: OnceLock<MemberPlan>,
}

impl MappingConfiguration {
    /// Start declaring a mapping from `S` to `D`.
    ///
    /// `S` may be a capability such as `dyn Trait`; `D` must be concrete.
    pub fn builder<S, D>() -> ConfigurationBuilder<S, D>
    where
        S: ?Sized + TypeShape + 'static,
        D: Mappable + TypeShape,
    {
        ConfigurationBuilder {
            config: MappingConfiguration {
                pair: TypePair::of::<S, D>(),
                source_shape: S::static_shape(),
                destination_shape: D::static_shape(),
                ignored: IndexSet::new(),
                custom: IndexMap::new(),
                after_map: None,
                plan: OnceLock::new(),
            },
            _marker: PhantomData,
        }
    }

    /// The (source, destination) key this configuration is registered under.
    pub fn pair(&self) -> TypePair {
        self.pair
    }

    pub fn source_shape(&self) -> &'static Shape {
        self.source_shape
    }

    pub fn destination_shape(&self) -> &'static Shape {
        self.destination_shape
    }

    /// Source property names excluded from mapping.
    pub fn ignored(&self) -> impl Iterator<Item = &str> {
        self.ignored.iter().map(String::as_str)
    }

    pub fn is_ignored(&self, name: &str) -> bool {
        self.ignored.contains(name)
    }

    /// Destination property names computed by custom mappings.
    pub fn custom_targets(&self) -> impl Iterator<Item = &str> {
        self.custom.keys().map(String::as_str)
    }

    /// Hook run after every property has been assigned.
    pub fn after_map(&self) -> Option<&AfterMap> {
        self.after_map.as_ref()
    }

    pub fn is_finalized(&self) -> bool {
        self.plan.get().is_some()
    }

    /// The member plan, if already finalized.
    pub fn plan(&self) -> Option<&MemberPlan> {
        self.plan.get()
    }

    /// Compute the member plan once. Racing callers all get the same plan.
    pub(crate) fn finalize(&self) -> &MemberPlan {
        self.plan.get_or_init(|| {
            let plan = MemberPlan::compute(self);
            tracing::debug!(
                pair = %self.pair,
                scalars = plan.scalars.len(),
                collections = plan.collections.len(),
                custom = plan.custom.len(),
                "finalized mapping configuration"
            );
            plan
        })
    }

    pub(crate) fn extend_ignored<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) {
        self.ignored.extend(names.into_iter().map(str::to_string));
    }

    /// Custom targets also named in the ignored set.
    pub(crate) fn ignored_custom_targets(&self) -> impl Iterator<Item = &str> {
        self.custom
            .keys()
            .filter(|name| self.ignored.contains(*name))
            .map(String::as_str)
    }

    /// Custom targets that don't exist or can't be written on the destination.
    pub(crate) fn unknown_custom_targets(&self) -> impl Iterator<Item = &str> {
        self.custom
            .keys()
            .filter(|name| {
                !self
                    .destination_shape
                    .property(name)
                    .is_some_and(PropertyDescriptor::is_writable)
            })
            .map(String::as_str)
    }
}

impl fmt::Debug for MappingConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappingConfiguration")
            .field("pair", &self.pair)
            .field("ignored", &self.ignored)
            .field("custom", &self.custom.keys().collect::<Vec<_>>())
            .field("after_map", &self.after_map.is_some())
            .field("finalized", &self.is_finalized())
            .finish()
    }
}

/// Builder for [`MappingConfiguration`].
pub struct ConfigurationBuilder<S: ?Sized, D> {
    config: MappingConfiguration,
    _marker: PhantomData<fn(&S, &mut D)>,
}

impl<S: ?Sized + 'static, D: Mappable> ConfigurationBuilder<S, D> {
    /// Never copy the named source property.
    pub fn ignore(mut self, name: impl Into<String>) -> Self {
        self.config.ignored.insert(name.into());
        self
    }

    /// Compute `destination` from the source through its dynamic interface.
    pub fn map_from_dyn<F>(mut self, destination: impl Into<String>, expr: F) -> Self
    where
        F: Fn(&dyn Mappable) -> Value + Send + Sync + 'static,
    {
        self.config.custom.insert(destination.into(), Arc::new(expr));
        self
    }

    /// Run `hook` after every mapping, with the source seen dynamically.
    pub fn after_map_dyn<F>(mut self, hook: F) -> Self
    where
        F: Fn(&dyn Mappable, &mut D) + Send + Sync + 'static,
    {
        self.config.after_map = Some(Arc::new(
            move |source: &dyn Mappable, destination: &mut dyn Mappable| {
                if let Some(destination) = destination.as_any_mut().downcast_mut::<D>() {
                    hook(source, destination);
                }
            },
        ));
        self
    }

    pub fn build(self) -> MappingConfiguration {
        self.config
    }
}

impl<S: Mappable, D: Mappable> ConfigurationBuilder<S, D> {
    /// Compute `destination` from the typed source.
    pub fn map_from<V, F>(self, destination: impl Into<String>, expr: F) -> Self
    where
        V: FieldValue,
        F: Fn(&S) -> V + Send + Sync + 'static,
    {
        self.map_from_dyn(destination, move |source| {
            source
                .as_any()
                .downcast_ref::<S>()
                .map_or(Value::Null, |source| expr(source).to_value())
        })
    }

    /// Run `hook` after every mapping.
    pub fn after_map<F>(mut self, hook: F) -> Self
    where
        F: Fn(&S, &mut D) + Send + Sync + 'static,
    {
        self.config.after_map = Some(Arc::new(
            move |source: &dyn Mappable, destination: &mut dyn Mappable| {
                let source = source.as_any().downcast_ref::<S>();
                let destination = destination.as_any_mut().downcast_mut::<D>();
                if let (Some(source), Some(destination)) = (source, destination) {
                    hook(source, destination);
                }
            },
        ));
        self
    }
}

/// A pair of same-named properties copied by assignment.
#[derive(Debug, Clone, Copy)]
pub struct MemberPair {
    pub source: &'static PropertyDescriptor,
    pub destination: &'static PropertyDescriptor,
}

/// A collection-shaped property mapped element by element.
#[derive(Debug, Clone, Copy)]
pub struct CollectionMember {
    pub source: &'static PropertyDescriptor,
    pub destination: &'static PropertyDescriptor,
    pub source_element: ElementType,
    pub destination_element: ElementType,
}

/// A destination property computed by a custom mapping.
#[derive(Clone)]
pub struct CustomMember {
    pub destination: &'static PropertyDescriptor,
    pub expr: CustomMapping,
}

impl fmt::Debug for CustomMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomMember")
            .field("destination", &self.destination.name())
            .finish()
    }
}

/// The finalized member lists of a configuration.
///
/// A destination property appears in at most one list, and ignored source
/// names appear in none.
#[derive(Debug, Default)]
pub struct MemberPlan {
    pub scalars: Vec<MemberPair>,
    pub collections: Vec<CollectionMember>,
    pub custom: Vec<CustomMember>,
}

impl MemberPlan {
    fn compute(config: &MappingConfiguration) -> Self {
        let mut plan = MemberPlan::default();
        let source_shape = config.source_shape;

        for destination in config.destination_shape.properties() {
            let name = destination.name();
            if config.is_ignored(name) || !destination.is_writable() {
                continue;
            }

            if let Some(expr) = config.custom.get(name) {
                plan.custom.push(CustomMember {
                    destination,
                    expr: Arc::clone(expr),
                });
                continue;
            }

            let Some(source) = source_shape.property(name) else {
                continue;
            };

            match (source.shape(), destination.shape()) {
                (FieldShape::Scalar, FieldShape::Scalar) => {
                    // Exact declared type only; `i32` never feeds `i64`
                    if source.type_info() == destination.type_info() {
                        plan.scalars.push(MemberPair {
                            source,
                            destination,
                        });
                    }
                }
                (source_kind, destination_kind) => {
                    let (Some(source_element), Some(destination_element)) =
                        (source_kind.element(), destination_kind.element())
                    else {
                        continue;
                    };
                    if elements_compatible(source_element, destination_element) {
                        plan.collections.push(CollectionMember {
                            source,
                            destination,
                            source_element,
                            destination_element,
                        });
                    }
                }
            }
        }

        plan
    }
}

/// Identical element types copy; differing complex element types map.
fn elements_compatible(source: ElementType, destination: ElementType) -> bool {
    source.info() == destination.info() || (!source.is_simple() && !destination.is_simple())
}

/// A set of mapping declarations.
///
/// How profiles are found is up to the caller: an explicit list, a static
/// table, or anything else that ends in [`Mapper::add_profile`](crate::Mapper::add_profile).
pub trait Profile {
    fn configure(&self, registrar: &mut Registrar);
}

/// Collects the configurations a [`Profile`] declares.
#[derive(Debug, Default)]
pub struct Registrar {
    configurations: Vec<MappingConfiguration>,
}

impl Registrar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, config: MappingConfiguration) -> &mut Self {
        self.configurations.push(config);
        self
    }

    pub fn len(&self) -> usize {
        self.configurations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configurations.is_empty()
    }

    pub(crate) fn into_configurations(self) -> Vec<MappingConfiguration> {
        self.configurations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default)]
    struct Person {
        id: i64,
        first: String,
        last: String,
        password: String,
        score: i32,
        friends: Vec<Person>,
        nicknames: Option<Vec<String>>,
    }

    #[derive(Clone, Default)]
    struct PersonView {
        id: i64,
        full_name: String,
        password: String,
        score: i64,
        friends: Vec<PersonView>,
        nicknames: Option<Vec<String>>,
        first: String,
        audit: String,
    }

    crate::mappable!(Person {
        id,
        first,
        last,
        password,
        score,
        friends,
        nicknames
    });
    crate::mappable!(PersonView {
        id,
        full_name,
        password,
        score,
        friends,
        nicknames,
        first
    } readonly { audit });

    fn names(pairs: &[MemberPair]) -> Vec<&str> {
        pairs.iter().map(|p| p.destination.name()).collect()
    }

    #[test]
    fn test_plan_partitions_members() {
        let config = MappingConfiguration::builder::<Person, PersonView>()
            .ignore("password")
            .map_from("full_name", |p: &Person| format!("{} {}", p.first, p.last))
            .build();

        assert!(!config.is_finalized());
        assert!(config.plan().is_none());
        let plan = config.finalize();
        assert!(config.is_finalized());
        assert!(config.plan().is_some_and(|p| std::ptr::eq(p, plan)));
        assert_eq!(config.ignored().collect::<Vec<_>>(), vec!["password"]);

        // score differs in declared type, password is ignored
        assert_eq!(names(&plan.scalars), vec!["id", "first"]);
        let collections: Vec<_> = plan
            .collections
            .iter()
            .map(|c| c.destination.name())
            .collect();
        assert_eq!(collections, vec!["friends", "nicknames"]);
        assert_eq!(plan.custom.len(), 1);
        assert_eq!(plan.custom[0].destination.name(), "full_name");
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let config = MappingConfiguration::builder::<Person, PersonView>().build();

        let first = config.finalize() as *const MemberPlan;
        let second = config.finalize() as *const MemberPlan;
        assert_eq!(first, second);
    }

    #[test]
    fn test_custom_mapping_wins_over_name_match() {
        let config = MappingConfiguration::builder::<Person, PersonView>()
            .map_from("id", |p: &Person| p.id * 10)
            .build();
        let plan = config.finalize();

        assert!(!names(&plan.scalars).contains(&"id"));
        assert_eq!(plan.custom[0].destination.name(), "id");
    }

    #[test]
    fn test_unknown_custom_targets() {
        let config = MappingConfiguration::builder::<Person, PersonView>()
            .map_from("nope", |p: &Person| p.id)
            .map_from("audit", |_: &Person| String::from("x"))
            .map_from("full_name", |p: &Person| p.first.clone())
            .build();

        let unknown: Vec<_> = config.unknown_custom_targets().collect();
        assert_eq!(unknown, vec!["nope", "audit"]);
    }

    #[test]
    fn test_ignored_custom_targets() {
        let config = MappingConfiguration::builder::<Person, PersonView>()
            .ignore("full_name")
            .ignore("password")
            .map_from("full_name", |p: &Person| p.first.clone())
            .map_from("first", |p: &Person| p.last.clone())
            .build();

        let conflicts: Vec<_> = config.ignored_custom_targets().collect();
        assert_eq!(conflicts, vec!["full_name"]);
    }

    #[test]
    fn test_type_pair_display() {
        let pair = TypePair::of::<Person, PersonView>();
        assert_eq!(pair.to_string(), "Person -> PersonView");
    }

    #[test]
    fn test_registrar_collects() {
        struct People;

        impl Profile for People {
            fn configure(&self, registrar: &mut Registrar) {
                registrar
                    .add(MappingConfiguration::builder::<Person, PersonView>().build())
                    .add(MappingConfiguration::builder::<PersonView, Person>().build());
            }
        }

        let mut registrar = Registrar::new();
        People.configure(&mut registrar);
        assert_eq!(registrar.len(), 2);
    }
}
