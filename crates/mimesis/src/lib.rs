//! Mimesis: profile-driven object mapping
//!
//! Mappings between a source type and a destination type are declared once in
//! profiles, then executed on demand. Same-named, same-typed properties are
//! copied by a cached generated mapper; collections of complex elements are
//! rebuilt element by element through their own mappings; custom mappings
//! and post-mapping hooks cover the rest. Sources can also be registered by
//! capability (`dyn Trait`) and resolved from the runtime type.

mod collection;
mod config;
mod generated;
mod mapper;
mod profile;
mod registry;
mod shape;
mod value;

pub use config::{ElementPolicy, MapperConfig, MapperConfigError, ProfileOverride};
pub use generated::{GeneratedMapper, GeneratedMapperCache};
pub use mapper::{MapError, MapSequence, Mapper, MapperStats};
pub use profile::{
    AfterMap, CollectionMember, ConfigurationBuilder, CustomMapping, CustomMember,
    MappingConfiguration, MemberPair, MemberPlan, Profile, Registrar, TypePair,
};
pub use registry::{ConfigurationError, Registry};
pub use shape::{
    ElementType, FieldShape, Mappable, PropertyDescriptor, Shape, ShapeBuilder, TypeInfo, TypeShape,
};
pub use value::{Element, FieldValue, Value};
