//! Shapes: static type descriptors for mappable types.
//!
//! Rust has no runtime reflection, so every mappable type publishes a
//! [`Shape`] once: its properties (name, declared type, accessors), the
//! capabilities it implements, and how to build a fresh instance.
//! Shapes are computed lazily and live for the rest of the process.

use crate::value::{Element, FieldValue, Value};
use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identity of a Rust type, comparable at runtime.
///
/// Equality and hashing use the `TypeId` only; the name is for humans.
#[derive(Clone, Copy)]
pub struct TypeInfo {
    id: TypeId,
    name: &'static str,
}

impl TypeInfo {
    /// Type info for `T`. Works for unsized capability types like `dyn Trait`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The underlying `TypeId`, the sole basis for equality.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without its module path, e.g. `UserDto` or `Vec<app::Order>`.
    pub fn short_name(&self) -> &'static str {
        let head = self.name.split('<').next().unwrap_or(self.name);
        match head.rfind("::") {
            Some(idx) => &self.name[idx + 2..],
            None => self.name.strip_prefix("dyn ").unwrap_or(self.name),
        }
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl Hash for TypeInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Element type of a collection-shaped property.
///
/// Complex elements carry a resolver for their [`Shape`]. The resolver is
/// only called on use, so self-referential types never recurse while their
/// shape is being built.
#[derive(Clone, Copy)]
pub struct ElementType {
    info: TypeInfo,
    resolve: fn() -> Option<&'static Shape>,
}

impl ElementType {
    pub fn of<T: FieldValue>() -> Self {
        Self {
            info: TypeInfo::of::<T>(),
            resolve: T::complex_shape,
        }
    }

    /// Declared element type, including any `Option` wrapper.
    pub fn info(&self) -> TypeInfo {
        self.info
    }

    /// Shape of the element, if the element type is complex.
    pub fn shape(&self) -> Option<&'static Shape> {
        (self.resolve)()
    }

    /// Numbers, text, booleans and `simple_value!` types are copied as-is.
    pub fn is_simple(&self) -> bool {
        self.shape().is_none()
    }
}

impl fmt::Debug for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ElementType({})", self.info.name)
    }
}

/// How a property's declared type holds its data.
///
/// Computed once when the owning shape is built; mapping never re-detects it.
#[derive(Debug, Clone, Copy)]
pub enum FieldShape {
    /// Single value, copied by assignment. Text is always scalar.
    Scalar,
    /// Growable ordered list (`Vec<T>`).
    List(ElementType),
    /// Fixed array allocated at its final length (`Box<[T]>`).
    Array(ElementType),
    /// Generic ordered sequence (`VecDeque<T>`).
    Sequence(ElementType),
}

impl FieldShape {
    pub fn element(&self) -> Option<ElementType> {
        match self {
            FieldShape::Scalar => None,
            FieldShape::List(elem) | FieldShape::Array(elem) | FieldShape::Sequence(elem) => {
                Some(*elem)
            }
        }
    }

    pub fn is_collection(&self) -> bool {
        !matches!(self, FieldShape::Scalar)
    }
}

type Reader = Box<dyn Fn(&dyn Any) -> Option<Value> + Send + Sync>;
type Writer = Box<dyn Fn(&mut dyn Any, Value) -> bool + Send + Sync>;
type ElementsReader = Box<dyn for<'a> Fn(&'a dyn Any) -> Option<Vec<Element<'a>>> + Send + Sync>;

fn elements_reader<F>(reader: F) -> F
where
    F: for<'a> Fn(&'a dyn Any) -> Option<Vec<Element<'a>>>,
{
    reader
}

/// A single named property of a shape.
pub struct PropertyDescriptor {
    name: &'static str,
    ty: TypeInfo,
    shape: FieldShape,
    reader: Option<Reader>,
    elements: Option<ElementsReader>,
    writer: Option<Writer>,
}

impl PropertyDescriptor {
    /// Readable and writable struct field.
    pub fn field<S: 'static, T: FieldValue>(
        name: &'static str,
        get: fn(&S) -> &T,
        get_mut: fn(&mut S) -> &mut T,
    ) -> Self {
        Self {
            writer: Some(Box::new(move |target: &mut dyn Any, value: Value| {
                let Some(target) = target.downcast_mut::<S>() else {
                    return false;
                };
                match T::from_value(value) {
                    Some(value) => {
                        *get_mut(target) = value;
                        true
                    }
                    None => false,
                }
            })),
            ..Self::readonly(name, get)
        }
    }

    /// Field that can be read as a source but never assigned as a destination.
    pub fn readonly<S: 'static, T: FieldValue>(name: &'static str, get: fn(&S) -> &T) -> Self {
        Self {
            name,
            ty: TypeInfo::of::<T>(),
            shape: T::field_shape(),
            reader: Some(Box::new(move |source: &dyn Any| {
                source.downcast_ref::<S>().map(|s| get(s).to_value())
            })),
            elements: Some(Box::new(elements_reader(move |source| {
                source.downcast_ref::<S>().and_then(|s| get(s).elements())
            }))),
            writer: None,
        }
    }

    /// Property declared by a capability. Values are read through the
    /// concrete instance's property of the same name.
    pub fn declared<T: FieldValue>(name: &'static str) -> Self {
        Self {
            name,
            ty: TypeInfo::of::<T>(),
            shape: T::field_shape(),
            reader: None,
            elements: None,
            writer: None,
        }
    }

    /// Property name, shared by same-named properties across types.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Declared type of the property.
    pub fn type_info(&self) -> TypeInfo {
        self.ty
    }

    /// Scalar or collection kind, fixed when the owning shape was built.
    pub fn shape(&self) -> FieldShape {
        self.shape
    }

    /// Whether the property can be assigned as a destination.
    pub fn is_writable(&self) -> bool {
        self.writer.is_some()
    }

    /// Read this property from `instance`.
    ///
    /// Returns `None` if the instance is not of the owning type and has no
    /// property of the same name and declared type.
    pub fn read(&self, instance: &dyn Mappable) -> Option<Value> {
        let reader = match &self.reader {
            Some(reader) => reader,
            None => self.concrete_for(instance)?.reader.as_ref()?,
        };
        reader(instance.as_any())
    }

    /// Borrow the elements of this collection property on `instance`.
    ///
    /// Returns `None` for scalars and null collections.
    pub fn elements<'a>(&self, instance: &'a dyn Mappable) -> Option<Vec<Element<'a>>> {
        let reader = match &self.elements {
            Some(reader) => reader,
            None => self.concrete_for(instance)?.elements.as_ref()?,
        };
        reader(instance.as_any())
    }

    /// The instance's own property behind a capability-declared one.
    fn concrete_for(&self, instance: &dyn Mappable) -> Option<&'static PropertyDescriptor> {
        let concrete = instance.shape().property(self.name)?;
        if concrete.ty != self.ty {
            tracing::trace!(
                property = self.name,
                declared = %self.ty,
                actual = %concrete.ty,
                "capability property type differs on concrete type"
            );
            return None;
        }
        Some(concrete)
    }

    /// Assign `value` to this property on `instance`.
    ///
    /// Returns `false` if the property is read-only or rejects the value.
    pub fn write(&self, instance: &mut dyn Mappable, value: Value) -> bool {
        match &self.writer {
            Some(writer) => writer(instance.as_any_mut(), value),
            None => false,
        }
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("name", &self.name)
            .field("type", &self.ty)
            .field("shape", &self.shape)
            .field("writable", &self.writer.is_some())
            .finish()
    }
}

/// Static description of a mappable type or capability.
pub struct Shape {
    info: TypeInfo,
    properties: Vec<PropertyDescriptor>,
    capabilities: Vec<TypeInfo>,
    constructor: Option<fn() -> Box<dyn Mappable>>,
}

impl Shape {
    /// Start describing a concrete type with a zero-argument constructor.
    pub fn builder<S: Mappable + Default>() -> ShapeBuilder<S> {
        ShapeBuilder {
            shape: Shape {
                info: TypeInfo::of::<S>(),
                properties: Vec::new(),
                capabilities: Vec::new(),
                constructor: Some(construct_default::<S>),
            },
            _marker: std::marker::PhantomData,
        }
    }

    /// Start describing a capability (interface or base type).
    pub fn interface<C: ?Sized + 'static>() -> ShapeBuilder<C> {
        ShapeBuilder {
            shape: Shape {
                info: TypeInfo::of::<C>(),
                properties: Vec::new(),
                capabilities: Vec::new(),
                constructor: None,
            },
            _marker: std::marker::PhantomData,
        }
    }

    /// Type this shape describes.
    pub fn info(&self) -> TypeInfo {
        self.info
    }

    /// Properties in declaration order.
    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Capabilities in declaration order.
    pub fn capabilities(&self) -> &[TypeInfo] {
        &self.capabilities
    }

    pub fn implements(&self, capability: TypeInfo) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Build a fresh default instance, if the type has a constructor.
    pub fn construct(&self) -> Option<Box<dyn Mappable>> {
        self.constructor.map(|construct| construct())
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shape")
            .field("info", &self.info)
            .field("properties", &self.properties)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

fn construct_default<S: Mappable + Default>() -> Box<dyn Mappable> {
    Box::new(S::default())
}

/// Builder for [`Shape`].
pub struct ShapeBuilder<S: ?Sized> {
    shape: Shape,
    _marker: std::marker::PhantomData<fn(&S)>,
}

impl<S: ?Sized + 'static> ShapeBuilder<S> {
    /// Property declared without accessors (capability shapes).
    pub fn declared<T: FieldValue>(mut self, name: &'static str) -> Self {
        self.shape
            .properties
            .push(PropertyDescriptor::declared::<T>(name));
        self
    }

    /// Record that the type implements a capability.
    pub fn implements<C: ?Sized + 'static>(mut self) -> Self {
        self.shape.capabilities.push(TypeInfo::of::<C>());
        self
    }

    pub fn build(self) -> Shape {
        self.shape
    }
}

impl<S: 'static> ShapeBuilder<S> {
    pub fn field<T: FieldValue>(
        mut self,
        name: &'static str,
        get: fn(&S) -> &T,
        get_mut: fn(&mut S) -> &mut T,
    ) -> Self {
        self.shape
            .properties
            .push(PropertyDescriptor::field(name, get, get_mut));
        self
    }

    pub fn readonly<T: FieldValue>(mut self, name: &'static str, get: fn(&S) -> &T) -> Self {
        self.shape
            .properties
            .push(PropertyDescriptor::readonly(name, get));
        self
    }
}

/// A value whose properties can be read and written through its [`Shape`].
///
/// Usually implemented with [`mappable!`](crate::mappable).
pub trait Mappable: Any + Send + Sync {
    fn shape(&self) -> &'static Shape;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;

    fn clone_boxed(&self) -> Box<dyn Mappable>;
}

impl dyn Mappable {
    /// Concrete runtime type of this value.
    pub fn type_info(&self) -> TypeInfo {
        self.shape().info()
    }

    /// Read a property by name.
    pub fn property(&self, name: &str) -> Option<Value> {
        self.shape().property(name)?.read(self)
    }

    pub fn downcast_ref<T: Mappable>(&self) -> Option<&T> {
        self.as_any().downcast_ref()
    }

    pub fn downcast_mut<T: Mappable>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut()
    }
}

impl fmt::Debug for dyn Mappable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct(self.type_info().short_name());
        for property in self.shape().properties() {
            match property.read(self) {
                Some(value) => out.field(property.name(), &value),
                None => out.field(property.name(), &"<unreadable>"),
            };
        }
        out.finish()
    }
}

impl Clone for Box<dyn Mappable> {
    fn clone(&self) -> Self {
        self.clone_boxed()
    }
}

/// Static access to a type's shape.
///
/// Implemented for concrete types by [`mappable!`](crate::mappable) and for
/// capability types such as `dyn Trait` by [`capability!`](crate::capability).
pub trait TypeShape {
    fn static_shape() -> &'static Shape;
}

/// Implement [`Mappable`], [`TypeShape`] and [`FieldValue`] for a struct.
///
/// The struct must implement `Clone` and `Default`.
///
/// ```
/// use mimesis::mappable;
///
/// #[derive(Clone, Default)]
/// struct User {
///     id: i64,
///     name: String,
///     created: u64,
/// }
///
/// mappable!(User { id, name } readonly { created });
/// ```
#[macro_export]
macro_rules! mappable {
    (
        $ty:ty { $($field:ident),* $(,)? }
        $(readonly { $($ro:ident),* $(,)? })?
        $(implements [ $($cap:ty),* $(,)? ])?
    ) => {
        impl $crate::TypeShape for $ty {
            fn static_shape() -> &'static $crate::Shape {
                static SHAPE: ::std::sync::LazyLock<$crate::Shape> =
                    ::std::sync::LazyLock::new(|| {
                        $crate::Shape::builder::<$ty>()
                            $(.field(stringify!($field), |s: &$ty| &s.$field, |s: &mut $ty| &mut s.$field))*
                            $($(.readonly(stringify!($ro), |s: &$ty| &s.$ro))*)?
                            $($(.implements::<$cap>())*)?
                            .build()
                    });
                &SHAPE
            }
        }

        impl $crate::Mappable for $ty {
            fn shape(&self) -> &'static $crate::Shape {
                <Self as $crate::TypeShape>::static_shape()
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                self
            }

            fn into_any(
                self: ::std::boxed::Box<Self>,
            ) -> ::std::boxed::Box<dyn ::std::any::Any> {
                self
            }

            fn clone_boxed(&self) -> ::std::boxed::Box<dyn $crate::Mappable> {
                ::std::boxed::Box::new(::std::clone::Clone::clone(self))
            }
        }

        impl $crate::FieldValue for $ty {
            fn complex_shape() -> ::std::option::Option<&'static $crate::Shape> {
                ::std::option::Option::Some(<Self as $crate::TypeShape>::static_shape())
            }

            fn as_mappable(&self) -> ::std::option::Option<&dyn $crate::Mappable> {
                ::std::option::Option::Some(self)
            }

            fn to_value(&self) -> $crate::Value {
                $crate::Value::Object(::std::boxed::Box::new(::std::clone::Clone::clone(self)))
            }

            fn from_value(value: $crate::Value) -> ::std::option::Option<Self> {
                value.into_object::<Self>()
            }
        }
    };
}

/// Describe a capability (interface or base type) that sources can be
/// registered against.
///
/// ```
/// use mimesis::capability;
///
/// trait Named {}
///
/// capability!(dyn Named { name: String });
/// ```
#[macro_export]
macro_rules! capability {
    ($cap:ty { $($name:ident : $fty:ty),* $(,)? }) => {
        impl $crate::TypeShape for $cap {
            fn static_shape() -> &'static $crate::Shape {
                static SHAPE: ::std::sync::LazyLock<$crate::Shape> =
                    ::std::sync::LazyLock::new(|| {
                        $crate::Shape::interface::<$cap>()
                            $(.declared::<$fty>(stringify!($name)))*
                            .build()
                    });
                &SHAPE
            }
        }
    };
}
