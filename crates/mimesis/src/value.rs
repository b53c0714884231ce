//! Dynamic values: what flows between a property reader and a writer.

use crate::shape::{ElementType, FieldShape, Mappable, Shape};
use std::any::Any;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// A property value detached from its owning type.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Char(char),
    String(String),
    List(Vec<Value>),
    /// A complex value with its own shape.
    Object(Box<dyn Mappable>),
    /// A simple value type without a dedicated variant (dates, money, ids).
    Opaque(Arc<dyn Any + Send + Sync>),
}

impl Value {
    /// Wrap a simple value type.
    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        Value::Opaque(Arc::new(value))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::UInt(n) => i64::try_from(*n).ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt(n) => Some(*n),
            Value::Int(n) => u64::try_from(*n).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&dyn Mappable> {
        match self {
            Value::Object(obj) => Some(obj.as_ref()),
            _ => None,
        }
    }

    /// Take the object out if it is exactly `T`.
    pub fn into_object<T: Mappable>(self) -> Option<T> {
        match self {
            Value::Object(obj) => obj.into_any().downcast::<T>().ok().map(|obj| *obj),
            _ => None,
        }
    }

    /// Take the opaque value out if it is exactly `T`.
    pub fn into_opaque<T: Any + Send + Sync + Clone>(self) -> Option<T> {
        match self {
            Value::Opaque(inner) => {
                let inner = inner.downcast::<T>().ok()?;
                Some(Arc::try_unwrap(inner).unwrap_or_else(|shared| (*shared).clone()))
            }
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::UInt(a), Value::UInt(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            // Objects compare property-wise through their shapes
            (Value::Object(a), Value::Object(b)) => {
                a.type_info() == b.type_info()
                    && a
                        .shape()
                        .properties()
                        .iter()
                        .all(|p| p.read(a.as_ref()) == p.read(b.as_ref()))
            }
            (Value::Opaque(a), Value::Opaque(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::UInt(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(arr: Vec<T>) -> Self {
        Value::List(arr.into_iter().map(Into::into).collect())
    }
}

/// One element of a collection property.
///
/// Complex elements are borrowed from the collection that owns them.
#[derive(Debug)]
pub enum Element<'a> {
    Null,
    Simple(Value),
    Object(&'a dyn Mappable),
}

impl<'a> Element<'a> {
    pub fn of<T: FieldValue>(item: &'a T) -> Self {
        match item.as_mappable() {
            Some(object) => Element::Object(object),
            None => match item.to_value() {
                Value::Null => Element::Null,
                value => Element::Simple(value),
            },
        }
    }
}

/// Conversion between a field's Rust type and [`Value`].
///
/// `from_value` only accepts the variant `to_value` produces; it never
/// coerces between unrelated types.
pub trait FieldValue: Sized + Send + Sync + 'static {
    fn field_shape() -> FieldShape {
        FieldShape::Scalar
    }

    /// Shape of the type, for complex (mappable) types only.
    fn complex_shape() -> Option<&'static Shape> {
        None
    }

    /// Borrow the value as a mappable object, for complex types only.
    fn as_mappable(&self) -> Option<&dyn Mappable> {
        None
    }

    /// Elements of a collection type, `None` for scalars and null.
    fn elements(&self) -> Option<Vec<Element<'_>>> {
        None
    }

    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> Option<Self>;
}

macro_rules! signed_field_value {
    ($($ty:ty),*) => {$(
        impl FieldValue for $ty {
            fn to_value(&self) -> Value {
                Value::Int(*self as i64)
            }

            fn from_value(value: Value) -> Option<Self> {
                match value {
                    Value::Int(n) => <$ty>::try_from(n).ok(),
                    _ => None,
                }
            }
        }
    )*};
}

macro_rules! unsigned_field_value {
    ($($ty:ty),*) => {$(
        impl FieldValue for $ty {
            fn to_value(&self) -> Value {
                Value::UInt(*self as u64)
            }

            fn from_value(value: Value) -> Option<Self> {
                match value {
                    Value::UInt(n) => <$ty>::try_from(n).ok(),
                    _ => None,
                }
            }
        }
    )*};
}

signed_field_value!(i8, i16, i32, i64, isize);
unsigned_field_value!(u8, u16, u32, u64, usize);

impl FieldValue for f32 {
    fn to_value(&self) -> Value {
        Value::Float(*self as f64)
    }

    fn from_value(value: Value) -> Option<Self> {
        value.as_f64().map(|n| n as f32)
    }
}

impl FieldValue for f64 {
    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    fn from_value(value: Value) -> Option<Self> {
        value.as_f64()
    }
}

impl FieldValue for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FieldValue for char {
    fn to_value(&self) -> Value {
        Value::Char(*self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Char(c) => Some(c),
            _ => None,
        }
    }
}

impl FieldValue for String {
    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

// `None` is the only null a property can hold.
impl<T: FieldValue> FieldValue for Option<T> {
    fn field_shape() -> FieldShape {
        T::field_shape()
    }

    fn complex_shape() -> Option<&'static Shape> {
        T::complex_shape()
    }

    fn as_mappable(&self) -> Option<&dyn Mappable> {
        self.as_ref().and_then(T::as_mappable)
    }

    fn elements(&self) -> Option<Vec<Element<'_>>> {
        self.as_ref().and_then(T::elements)
    }

    fn to_value(&self) -> Value {
        match self {
            Some(inner) => inner.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => T::from_value(other).map(Some),
        }
    }
}

fn list_items<T: FieldValue>(value: Value) -> Option<impl Iterator<Item = Option<T>>> {
    match value {
        Value::List(items) => Some(items.into_iter().map(T::from_value)),
        _ => None,
    }
}

impl<T: FieldValue> FieldValue for Vec<T> {
    fn field_shape() -> FieldShape {
        FieldShape::List(ElementType::of::<T>())
    }

    fn elements(&self) -> Option<Vec<Element<'_>>> {
        Some(self.iter().map(Element::of).collect())
    }

    fn to_value(&self) -> Value {
        Value::List(self.iter().map(FieldValue::to_value).collect())
    }

    fn from_value(value: Value) -> Option<Self> {
        list_items(value)?.collect()
    }
}

impl<T: FieldValue> FieldValue for Box<[T]> {
    fn field_shape() -> FieldShape {
        FieldShape::Array(ElementType::of::<T>())
    }

    fn elements(&self) -> Option<Vec<Element<'_>>> {
        Some(self.iter().map(Element::of).collect())
    }

    fn to_value(&self) -> Value {
        Value::List(self.iter().map(FieldValue::to_value).collect())
    }

    fn from_value(value: Value) -> Option<Self> {
        list_items(value)?
            .collect::<Option<Vec<T>>>()
            .map(Vec::into_boxed_slice)
    }
}

impl<T: FieldValue> FieldValue for VecDeque<T> {
    fn field_shape() -> FieldShape {
        FieldShape::Sequence(ElementType::of::<T>())
    }

    fn elements(&self) -> Option<Vec<Element<'_>>> {
        Some(self.iter().map(Element::of).collect())
    }

    fn to_value(&self) -> Value {
        Value::List(self.iter().map(FieldValue::to_value).collect())
    }

    fn from_value(value: Value) -> Option<Self> {
        list_items(value)?.collect()
    }
}

/// Implement [`FieldValue`] for simple value types (dates, money,
/// identifiers) that are copied as-is and never mapped field by field.
///
/// The types must implement `Clone + Send + Sync + 'static`.
#[macro_export]
macro_rules! simple_value {
    ($($ty:ty),* $(,)?) => {$(
        impl $crate::FieldValue for $ty {
            fn to_value(&self) -> $crate::Value {
                $crate::Value::opaque(::std::clone::Clone::clone(self))
            }

            fn from_value(value: $crate::Value) -> ::std::option::Option<Self> {
                value.into_opaque::<Self>()
            }
        }
    )*};
}

crate::simple_value!(Duration, SystemTime);
