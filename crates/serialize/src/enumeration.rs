//! Enums over an integral representation.
//!
//! An enum driver composes the driver of the enum's integral type: the
//! discriminant is written with the integral codec and reinterpreted as the
//! enum when read. `#[derive(PersistEnum)]` implements [`PersistEnum`] along
//! with [`Encode`](crate::Encode), [`Decode`](crate::Decode),
//! [`Element`](crate::Element) and [`Export`] for fieldless `#[repr(..)]`
//! enums.
//!
//! ```ignore
//! #[derive(Debug, Clone, Copy, PartialEq, Eq, PersistEnum)]
//! #[persist(name = "paint.Color")]
//! #[repr(u8)]
//! enum Color {
//!     Red = 1,
//!     Green = 2,
//! }
//! ```

use std::{any::type_name, fmt::Debug, sync::Arc};

use crate::{
    Decoder, Encoder,
    driver::Driver,
    error::{Error, Result},
    export::Export,
    reader::GraphReader,
    registry::Registry,
    value::Value,
    writer::GraphWriter,
};

/// An integer type usable as an enum representation.
pub trait Integral:
    Copy + Eq + Debug + Export + Send + Sync + 'static
{
    #[doc(hidden)]
    fn write_integral(self, writer: &mut GraphWriter<'_>) -> Result<()>;

    #[doc(hidden)]
    fn read_integral(reader: &mut GraphReader<'_>) -> Result<Self>;
}

macro_rules! impl_integral {
    ($($ty:ty => $emit:ident, $read:ident;)*) => {
        $(
            impl Integral for $ty {
                fn write_integral(
                    self,
                    writer: &mut GraphWriter<'_>,
                ) -> Result<()> {
                    Ok(writer.$emit(self)?)
                }

                fn read_integral(reader: &mut GraphReader<'_>) -> Result<Self> {
                    Ok(reader.$read()?)
                }
            }
        )*
    };
}

impl_integral! {
    i8 => emit_i8, read_i8;
    i16 => emit_i16, read_i16;
    i32 => emit_i32, read_i32;
    i64 => emit_i64, read_i64;
    u8 => emit_u8, read_u8;
    u16 => emit_u16, read_u16;
    u32 => emit_u32, read_u32;
    u64 => emit_u64, read_u64;
}

/// A fieldless enum stored as its integral discriminant.
pub trait PersistEnum: Sized + Send + Sync + 'static {
    /// The name recorded in streams.
    const TYPE_NAME: &'static str;

    /// The integral representation (the enum's `#[repr]`).
    type Repr: Integral;

    /// The discriminant of `self`.
    fn to_repr(&self) -> Self::Repr;

    /// The variant with discriminant `repr`, if any.
    fn from_repr(repr: Self::Repr) -> Option<Self>;

    /// The declared name of the variant.
    fn variant_name(&self) -> &'static str;
}

#[doc(hidden)]
pub fn write_enum<T: PersistEnum>(
    value: &T,
    writer: &mut GraphWriter<'_>,
) -> Result<()> {
    value.to_repr().write_integral(writer)
}

#[doc(hidden)]
pub fn read_enum<T: PersistEnum>(reader: &mut GraphReader<'_>) -> Result<T> {
    let repr = T::Repr::read_integral(reader)?;

    T::from_repr(repr).ok_or_else(|| {
        Error::invalid_data(format!(
            "{repr:?} is not a discriminant of `{}`",
            T::TYPE_NAME
        ))
    })
}

#[doc(hidden)]
pub fn enum_driver<T: PersistEnum>(registry: &Registry) -> Result<Arc<Driver>> {
    registry.resolve_enum::<T>()
}

#[doc(hidden)]
pub fn enum_from_value<T: PersistEnum>(value: Value) -> Result<T> {
    let shared = value.downcast::<T>()?;

    T::from_repr(shared.to_repr()).ok_or_else(|| Error::TypeMismatch {
        expected: type_name::<T>().to_owned(),
        found: "an unknown discriminant".to_owned(),
    })
}

#[doc(hidden)]
pub fn enum_to_value<T: PersistEnum>(value: &T) -> Value {
    T::from_repr(value.to_repr()).map_or(Value::Null, Value::object)
}
