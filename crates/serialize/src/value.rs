//! The dynamically typed slot of the object graph.

use std::{
    any::{Any, type_name},
    fmt,
    sync::Arc,
};

use chrono::{DateTime, FixedOffset, TimeDelta, Utc};
use uuid::Uuid;

use crate::error::{Error, Result};

/// A type-erased instance that still knows which type it was.
///
/// Implemented for every `Any + Send + Sync` type.
pub trait Instance: Any + Send + Sync {
    /// The Rust type name, for diagnostics only.
    fn type_name(&self) -> &'static str;

    /// Borrows the instance as [`Any`].
    fn as_any(&self) -> &(dyn Any + Send + Sync);

    /// Converts the shared instance into a shared [`Any`].
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> Instance for T {
    fn type_name(&self) -> &'static str { type_name::<T>() }

    fn as_any(&self) -> &(dyn Any + Send + Sync) { self }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> { self }
}

/// A shared, type-erased instance of any registered type.
pub type Object = Arc<dyn Instance>;

/// Returns the identity used by reference tables: the address of the shared
/// allocation.
#[must_use]
pub fn identity(object: &Object) -> usize {
    Arc::as_ptr(object).cast::<()>() as usize
}

/// The Rust type name of the instance behind `object`.
#[must_use]
pub(crate) fn type_name_of(object: &Object) -> &'static str {
    Instance::type_name(&**object)
}

pub(crate) fn erased(object: &Object) -> &(dyn Any + Send + Sync) {
    Instance::as_any(&**object)
}

/// A value that can stand for any node of the graph.
///
/// Scalars listed here are inlined on the wire without type descriptors.
/// Strings are shared and tracked by identity. Every other instance is an
/// [`Object`] described by its registered driver.
#[derive(Clone, Default)]
pub enum Value {
    /// The null reference.
    #[default]
    Null,

    /// A shared string.
    String(Arc<str>),

    /// A 32-bit signed integer.
    Int32(i32),

    /// A 64-bit float.
    Double(f64),

    /// A Unicode scalar value.
    Char(char),

    /// A 32-bit unsigned integer.
    UInt32(u32),

    /// A 32-bit float.
    Float(f32),

    /// A UTC timestamp.
    DateTime(DateTime<Utc>),

    /// A globally unique identifier.
    Guid(Uuid),

    /// A signed duration.
    TimeSpan(TimeDelta),

    /// A timestamp with a fixed UTC offset.
    DateTimeOffset(DateTime<FixedOffset>),

    /// Any other shared instance.
    Object(Object),
}

impl Value {
    /// Wraps an instance into a new shared [`Value::Object`].
    #[must_use]
    pub fn object<T: Any + Send + Sync>(value: T) -> Self {
        Self::Object(Arc::new(value))
    }

    /// Wraps an existing shared instance, preserving its identity.
    #[must_use]
    pub fn shared<T: Any + Send + Sync>(value: &Arc<T>) -> Self {
        Self::Object(value.clone())
    }

    /// Returns `true` for [`Value::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool { matches!(self, Self::Null) }

    /// A short name of the variant, used in error messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::String(_) => "string",
            Self::Int32(_) => "i32",
            Self::Double(_) => "f64",
            Self::Char(_) => "char",
            Self::UInt32(_) => "u32",
            Self::Float(_) => "f32",
            Self::DateTime(_) => "datetime",
            Self::Guid(_) => "guid",
            Self::TimeSpan(_) => "timespan",
            Self::DateTimeOffset(_) => "datetimeoffset",
            Self::Object(_) => "object",
        }
    }

    /// Returns the string if this is a [`Value::String`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the shared instance if this is a [`Value::Object`].
    #[must_use]
    pub const fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Borrows the instance as `T` if this is an object of that type.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_object().and_then(|object| erased(object).downcast_ref::<T>())
    }

    /// Converts into a shared `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if the value is not an object of type
    /// `T`.
    pub fn downcast<T: Any + Send + Sync>(self) -> Result<Arc<T>> {
        match self {
            Self::Object(object) => {
                let found = type_name_of(&object);
                Instance::into_any(object).downcast::<T>().map_err(|_| {
                    Error::TypeMismatch {
                        expected: type_name::<T>().to_owned(),
                        found: found.to_owned(),
                    }
                })
            }
            other => Err(Error::TypeMismatch {
                expected: type_name::<T>().to_owned(),
                found: other.kind().to_owned(),
            }),
        }
    }
}

impl PartialEq for Value {
    /// Scalars compare by value; strings by content; objects by identity.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Int32(a), Self::Int32(b)) => a == b,
            (Self::Double(a), Self::Double(b)) => a.to_bits() == b.to_bits(),
            (Self::Char(a), Self::Char(b)) => a == b,
            (Self::UInt32(a), Self::UInt32(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::DateTime(a), Self::DateTime(b)) => a == b,
            (Self::Guid(a), Self::Guid(b)) => a == b,
            (Self::TimeSpan(a), Self::TimeSpan(b)) => a == b,
            (Self::DateTimeOffset(a), Self::DateTimeOffset(b)) => {
                a == b && a.offset() == b.offset()
            }
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::String(s) => f.debug_tuple("String").field(s).finish(),
            Self::Int32(v) => f.debug_tuple("Int32").field(v).finish(),
            Self::Double(v) => f.debug_tuple("Double").field(v).finish(),
            Self::Char(v) => f.debug_tuple("Char").field(v).finish(),
            Self::UInt32(v) => f.debug_tuple("UInt32").field(v).finish(),
            Self::Float(v) => f.debug_tuple("Float").field(v).finish(),
            Self::DateTime(v) => f.debug_tuple("DateTime").field(v).finish(),
            Self::Guid(v) => f.debug_tuple("Guid").field(v).finish(),
            Self::TimeSpan(v) => f.debug_tuple("TimeSpan").field(v).finish(),
            Self::DateTimeOffset(v) => {
                f.debug_tuple("DateTimeOffset").field(v).finish()
            }
            Self::Object(object) => {
                write!(f, "Object({:#x})", identity(object))
            }
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self { Self::String(Arc::from(value)) }
}

impl From<String> for Value {
    fn from(value: String) -> Self { Self::String(Arc::from(value)) }
}

impl From<Arc<str>> for Value {
    fn from(value: Arc<str>) -> Self { Self::String(value) }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self { Self::Int32(value) }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self { Self::UInt32(value) }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self { Self::Double(value) }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self { Self::Float(value) }
}

impl From<char> for Value {
    fn from(value: char) -> Self { Self::Char(value) }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self { Self::DateTime(value) }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(value: DateTime<FixedOffset>) -> Self {
        Self::DateTimeOffset(value)
    }
}

impl From<Uuid> for Value {
    fn from(value: Uuid) -> Self { Self::Guid(value) }
}

impl From<TimeDelta> for Value {
    fn from(value: TimeDelta) -> Self { Self::TimeSpan(value) }
}

impl From<Object> for Value {
    fn from(value: Object) -> Self { Self::Object(value) }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self { value.map_or(Self::Null, Into::into) }
}
