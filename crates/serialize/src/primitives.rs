//! Built-in drivers for primitive types.
//!
//! Every primitive has a fixed, flat codec. The same codec is used when the
//! primitive is a field, an element of a mono-typed container, the payload
//! of an inlined scalar marker, or a boxed [`Object`].
//!
//! Timestamps and durations are stored as signed 64-bit tick counts of
//! 100 ns; timestamps count from 0001-01-01T00:00:00Z.

use std::{fmt, sync::Arc};

use chrono::{DateTime, FixedOffset, TimeDelta, Utc};
use uuid::Uuid;

use crate::{
    containers::Element,
    decode::{Decode, Decoder},
    descriptor::TypeDescriptor,
    driver::{
        Driver, DriverKind, deserialize_fn, downcast, export_fn, serialize_fn,
    },
    encode::{Encode, Encoder},
    error::{Error, Result},
    export::Export,
    reader::{Fetched, GraphReader},
    registry::Registry,
    value::{Object, Value},
    writer::GraphWriter,
};

/// Ticks between 0001-01-01 and the Unix epoch.
pub const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;

/// Ticks in one second.
pub const TICKS_PER_SECOND: i64 = 10_000_000;

const NANOS_PER_TICK: i64 = 100;

/// A type with a fixed built-in codec.
pub trait Primitive: Clone + Send + Sync + 'static {
    /// The name recorded in streams.
    const NAME: &'static str;

    /// Writes the value without any marker.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream fails or the value is out of range.
    fn write_flat(&self, writer: &mut GraphWriter<'_>) -> Result<()>;

    /// Reads a value written by [`Primitive::write_flat`].
    ///
    /// # Errors
    ///
    /// Returns an error if the stream fails or holds an invalid value.
    fn read_flat(reader: &mut GraphReader<'_>) -> Result<Self>;

    /// The exported form: an inlined scalar where one exists.
    fn export_value(&self) -> Value { Value::object(self.clone()) }

    /// Recovers the primitive from a dynamically read value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if the value holds another type.
    fn from_scalar(value: Value) -> Result<Self> {
        value.downcast::<Self>().map(|shared| (*shared).clone())
    }
}

macro_rules! impl_fixed_primitive {
    ($($ty:ty, $name:literal, $emit:ident, $read:ident;)*) => {
        $(
            impl Primitive for $ty {
                const NAME: &'static str = $name;

                fn write_flat(&self, writer: &mut GraphWriter<'_>) -> Result<()> {
                    Ok(writer.$emit(*self)?)
                }

                fn read_flat(reader: &mut GraphReader<'_>) -> Result<Self> {
                    Ok(reader.$read()?)
                }
            }
        )*
    };
}

impl_fixed_primitive! {
    bool, "bool", emit_bool, read_bool;
    i8, "i8", emit_i8, read_i8;
    i16, "i16", emit_i16, read_i16;
    i64, "i64", emit_i64, read_i64;
    i128, "i128", emit_i128, read_i128;
    u8, "u8", emit_u8, read_u8;
    u16, "u16", emit_u16, read_u16;
    u64, "u64", emit_u64, read_u64;
    u128, "u128", emit_u128, read_u128;
}

macro_rules! impl_scalar_primitive {
    ($($ty:ty, $name:literal, $emit:ident, $read:ident, $variant:ident;)*) => {
        $(
            impl Primitive for $ty {
                const NAME: &'static str = $name;

                fn write_flat(&self, writer: &mut GraphWriter<'_>) -> Result<()> {
                    Ok(writer.$emit(*self)?)
                }

                fn read_flat(reader: &mut GraphReader<'_>) -> Result<Self> {
                    Ok(reader.$read()?)
                }

                fn export_value(&self) -> Value { Value::$variant(*self) }

                fn from_scalar(value: Value) -> Result<Self> {
                    match value {
                        Value::$variant(v) => Ok(v),
                        other => other.downcast::<Self>().map(|v| *v),
                    }
                }
            }
        )*
    };
}

impl_scalar_primitive! {
    i32, "i32", emit_i32, read_i32, Int32;
    u32, "u32", emit_u32, read_u32, UInt32;
    f32, "f32", emit_f32, read_f32, Float;
    f64, "f64", emit_f64, read_f64, Double;
    char, "char", emit_char, read_char, Char;
}

impl Primitive for String {
    const NAME: &'static str = "string";

    fn write_flat(&self, writer: &mut GraphWriter<'_>) -> Result<()> {
        Ok(writer.emit_str(self)?)
    }

    fn read_flat(reader: &mut GraphReader<'_>) -> Result<Self> {
        Ok(reader.read_string()?)
    }

    fn export_value(&self) -> Value { Value::from(self.as_str()) }

    fn from_scalar(value: Value) -> Result<Self> {
        match value {
            Value::String(string) => Ok(string.to_string()),
            other => other.downcast::<Self>().map(|v| (*v).clone()),
        }
    }
}

/// A fixed-point decimal number: `mantissa * 10^-scale`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Decimal {
    mantissa: i128,
    scale: u8,
}

impl Decimal {
    /// The largest supported scale.
    pub const MAX_SCALE: u8 = 38;

    /// Creates `mantissa * 10^-scale`, or `None` if the scale is larger than
    /// [`Decimal::MAX_SCALE`].
    #[must_use]
    pub const fn new(mantissa: i128, scale: u8) -> Option<Self> {
        if scale > Self::MAX_SCALE {
            None
        } else {
            Some(Self { mantissa, scale })
        }
    }

    /// The unscaled integer value.
    #[must_use]
    pub const fn mantissa(&self) -> i128 { self.mantissa }

    /// The number of fractional digits.
    #[must_use]
    pub const fn scale(&self) -> u8 { self.scale }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.mantissa.unsigned_abs().to_string();
        let scale = usize::from(self.scale);
        let sign = if self.mantissa < 0 { "-" } else { "" };

        if scale == 0 {
            return write!(f, "{sign}{digits}");
        }

        let padded = format!("{digits:0>width$}", width = scale + 1);
        let (int, frac) = padded.split_at(padded.len() - scale);
        write!(f, "{sign}{int}.{frac}")
    }
}

impl Primitive for Decimal {
    const NAME: &'static str = "decimal";

    fn write_flat(&self, writer: &mut GraphWriter<'_>) -> Result<()> {
        writer.emit_i128(self.mantissa)?;
        Ok(writer.emit_u8(self.scale)?)
    }

    fn read_flat(reader: &mut GraphReader<'_>) -> Result<Self> {
        let mantissa = reader.read_i128()?;
        let scale = reader.read_u8()?;

        Self::new(mantissa, scale).ok_or_else(|| {
            Error::invalid_data(format!("decimal scale {scale} is too large"))
        })
    }
}

impl Primitive for Uuid {
    const NAME: &'static str = "guid";

    fn write_flat(&self, writer: &mut GraphWriter<'_>) -> Result<()> {
        Ok(writer.emit_raw_bytes(self.as_bytes())?)
    }

    fn read_flat(reader: &mut GraphReader<'_>) -> Result<Self> {
        let mut bytes = [0u8; 16];
        reader.read_exact_into(&mut bytes)?;
        Ok(Self::from_bytes(bytes))
    }

    fn export_value(&self) -> Value { Value::Guid(*self) }

    fn from_scalar(value: Value) -> Result<Self> {
        match value {
            Value::Guid(v) => Ok(v),
            other => other.downcast::<Self>().map(|v| *v),
        }
    }
}

fn out_of_range(what: &str) -> Error {
    Error::invalid_data(format!("{what} is out of the representable range"))
}

/// Converts a UTC timestamp to ticks; sub-tick precision is truncated.
///
/// # Errors
///
/// Returns [`Error::InvalidData`] if the tick count overflows.
pub fn utc_to_ticks(value: &DateTime<Utc>) -> Result<i64> {
    value
        .timestamp()
        .checked_mul(TICKS_PER_SECOND)
        .and_then(|ticks| {
            ticks.checked_add(
                i64::from(value.timestamp_subsec_nanos()) / NANOS_PER_TICK,
            )
        })
        .and_then(|ticks| ticks.checked_add(UNIX_EPOCH_TICKS))
        .ok_or_else(|| out_of_range("timestamp"))
}

/// Converts ticks to a UTC timestamp.
///
/// # Errors
///
/// Returns [`Error::InvalidData`] if the ticks are outside the range
/// `chrono` can represent.
pub fn utc_from_ticks(ticks: i64) -> Result<DateTime<Utc>> {
    let since_epoch = ticks
        .checked_sub(UNIX_EPOCH_TICKS)
        .ok_or_else(|| out_of_range("timestamp"))?;
    let seconds = since_epoch.div_euclid(TICKS_PER_SECOND);
    let nanos = since_epoch.rem_euclid(TICKS_PER_SECOND) * NANOS_PER_TICK;

    u32::try_from(nanos)
        .ok()
        .and_then(|nanos| DateTime::from_timestamp(seconds, nanos))
        .ok_or_else(|| out_of_range("timestamp"))
}

fn delta_to_ticks(value: &TimeDelta) -> Result<i64> {
    value
        .num_seconds()
        .checked_mul(TICKS_PER_SECOND)
        .and_then(|ticks| {
            ticks.checked_add(i64::from(value.subsec_nanos()) / NANOS_PER_TICK)
        })
        .ok_or_else(|| out_of_range("duration"))
}

fn delta_from_ticks(ticks: i64) -> Result<TimeDelta> {
    let seconds = ticks.div_euclid(TICKS_PER_SECOND);
    let nanos = ticks.rem_euclid(TICKS_PER_SECOND) * NANOS_PER_TICK;

    u32::try_from(nanos)
        .ok()
        .and_then(|nanos| TimeDelta::new(seconds, nanos))
        .ok_or_else(|| out_of_range("duration"))
}

impl Primitive for DateTime<Utc> {
    const NAME: &'static str = "datetime";

    fn write_flat(&self, writer: &mut GraphWriter<'_>) -> Result<()> {
        Ok(writer.emit_i64(utc_to_ticks(self)?)?)
    }

    fn read_flat(reader: &mut GraphReader<'_>) -> Result<Self> {
        utc_from_ticks(reader.read_i64()?)
    }

    fn export_value(&self) -> Value { Value::DateTime(*self) }

    fn from_scalar(value: Value) -> Result<Self> {
        match value {
            Value::DateTime(v) => Ok(v),
            other => other.downcast::<Self>().map(|v| *v),
        }
    }
}

impl Primitive for TimeDelta {
    const NAME: &'static str = "timespan";

    fn write_flat(&self, writer: &mut GraphWriter<'_>) -> Result<()> {
        Ok(writer.emit_i64(delta_to_ticks(self)?)?)
    }

    fn read_flat(reader: &mut GraphReader<'_>) -> Result<Self> {
        delta_from_ticks(reader.read_i64()?)
    }

    fn export_value(&self) -> Value { Value::TimeSpan(*self) }

    fn from_scalar(value: Value) -> Result<Self> {
        match value {
            Value::TimeSpan(v) => Ok(v),
            other => other.downcast::<Self>().map(|v| *v),
        }
    }
}

/// The UTC instant in ticks, then the offset in whole minutes.
impl Primitive for DateTime<FixedOffset> {
    const NAME: &'static str = "datetimeoffset";

    fn write_flat(&self, writer: &mut GraphWriter<'_>) -> Result<()> {
        let minutes = i16::try_from(self.offset().local_minus_utc() / 60)
            .map_err(|_| out_of_range("utc offset"))?;

        writer.emit_i64(utc_to_ticks(&self.to_utc())?)?;
        Ok(writer.emit_i16(minutes)?)
    }

    fn read_flat(reader: &mut GraphReader<'_>) -> Result<Self> {
        let instant = utc_from_ticks(reader.read_i64()?)?;
        let minutes = reader.read_i16()?;
        let offset = FixedOffset::east_opt(i32::from(minutes) * 60)
            .ok_or_else(|| out_of_range("utc offset"))?;

        Ok(instant.with_timezone(&offset))
    }

    fn export_value(&self) -> Value { Value::DateTimeOffset(*self) }

    fn from_scalar(value: Value) -> Result<Self> {
        match value {
            Value::DateTimeOffset(v) => Ok(v),
            other => other.downcast::<Self>().map(|v| *v),
        }
    }
}

macro_rules! impl_primitive_traits {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Encode for $ty {
                fn encode(&self, writer: &mut GraphWriter<'_>) -> Result<()> {
                    self.write_flat(writer)
                }
            }

            impl Decode for $ty {
                fn decode(reader: &mut GraphReader<'_>) -> Result<Self> {
                    <$ty as Primitive>::read_flat(reader)
                }
            }

            impl Export for $ty {
                fn to_value(&self) -> Value { self.export_value() }
            }

            impl Element for $ty {
                fn element_driver(registry: &Registry) -> Result<Arc<Driver>> {
                    registry.driver_of::<$ty>()
                }

                fn write_element(
                    &self,
                    writer: &mut GraphWriter<'_>,
                ) -> Result<()> {
                    self.write_flat(writer)
                }

                fn read_element(
                    reader: &mut GraphReader<'_>,
                    _: Option<&Arc<TypeDescriptor>>,
                ) -> Result<Fetched<Self>> {
                    <$ty as Primitive>::read_flat(reader).map(Fetched::Ready)
                }

                fn from_value(value: Value) -> Result<Self> {
                    <$ty as Primitive>::from_scalar(value)
                }
            }
        )*
    };
}

impl_primitive_traits!(
    bool,
    char,
    i8,
    i16,
    i32,
    i64,
    i128,
    u8,
    u16,
    u32,
    u64,
    u128,
    f32,
    f64,
    String,
    Decimal,
    Uuid,
    DateTime<Utc>,
    TimeDelta,
    DateTime<FixedOffset>,
);

fn primitive_driver<P: Primitive>() -> Driver {
    Driver::new::<P>(
        DriverKind::Primitive,
        Arc::new(TypeDescriptor::external(P::NAME)),
    )
    .with_serialize(serialize_fn(|value, writer| {
        downcast::<P>(value)?.write_flat(writer)
    }))
    .with_deserialize(deserialize_fn(|reader, _| {
        Ok(Arc::new(P::read_flat(reader)?) as Object)
    }))
    .with_export(export_fn(|value, properties| {
        properties.insert("value", downcast::<P>(value)?.export_value());
        Ok(())
    }))
}

pub(crate) fn builtin_drivers() -> Vec<Driver> {
    vec![
        primitive_driver::<bool>(),
        primitive_driver::<char>(),
        primitive_driver::<i8>(),
        primitive_driver::<i16>(),
        primitive_driver::<i32>(),
        primitive_driver::<i64>(),
        primitive_driver::<i128>(),
        primitive_driver::<u8>(),
        primitive_driver::<u16>(),
        primitive_driver::<u32>(),
        primitive_driver::<u64>(),
        primitive_driver::<u128>(),
        primitive_driver::<f32>(),
        primitive_driver::<f64>(),
        primitive_driver::<String>(),
        primitive_driver::<Decimal>(),
        primitive_driver::<Uuid>(),
        primitive_driver::<DateTime<Utc>>(),
        primitive_driver::<TimeDelta>(),
        primitive_driver::<DateTime<FixedOffset>>(),
    ]
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unix_epoch_is_tick_offset() {
        let epoch = DateTime::<Utc>::UNIX_EPOCH;
        assert_eq!(utc_to_ticks(&epoch).unwrap(), UNIX_EPOCH_TICKS);
        assert_eq!(utc_from_ticks(UNIX_EPOCH_TICKS).unwrap(), epoch);
    }

    #[test]
    fn ticks_before_epoch_round_trip() {
        let before = DateTime::from_timestamp(-1, 500_000_000).unwrap();
        let ticks = utc_to_ticks(&before).unwrap();

        assert_eq!(ticks, UNIX_EPOCH_TICKS - TICKS_PER_SECOND / 2);
        assert_eq!(utc_from_ticks(ticks).unwrap(), before);
    }

    #[test]
    fn negative_durations_round_trip() {
        let delta = TimeDelta::milliseconds(-1_500);
        let ticks = delta_to_ticks(&delta).unwrap();

        assert_eq!(ticks, -15_000_000);
        assert_eq!(delta_from_ticks(ticks).unwrap(), delta);
    }

    #[test]
    fn decimal_display() {
        assert_eq!(Decimal::new(12_345, 2).unwrap().to_string(), "123.45");
        assert_eq!(Decimal::new(-5, 3).unwrap().to_string(), "-0.005");
        assert_eq!(Decimal::new(7, 0).unwrap().to_string(), "7");
        assert!(Decimal::new(1, 39).is_none());
    }

    #[test]
    fn builtin_names_are_unique() {
        let drivers = builtin_drivers();
        let mut names =
            drivers.iter().map(|driver| driver.name()).collect::<Vec<_>>();
        names.sort_unstable();
        names.dedup();

        assert_eq!(names.len(), drivers.len());
    }
}
