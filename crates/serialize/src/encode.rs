//! Encoding traits.
//!
//! [`Encoder`] is the byte-level sink every writer implements; [`Encode`] is
//! implemented by types that know how to write themselves into a
//! [`GraphWriter`].

use std::{io, sync::Arc};

use crate::{error::Result, value::Value, wire, writer::GraphWriter};

/// A trait for sinks that can emit primitive values.
///
/// Only [`emit_u8`](Encoder::emit_u8) and
/// [`emit_raw_bytes`](Encoder::emit_raw_bytes) are required. Fixed-width
/// integers and floats are written little-endian; lengths, indices and
/// versions use [`emit_varint`](Encoder::emit_varint).
///
/// # Example
///
/// ```ignore
/// use skein_serialize::Encoder;
/// use std::io;
///
/// struct VecEncoder {
///     buffer: Vec<u8>,
/// }
///
/// impl Encoder for VecEncoder {
///     fn emit_u8(&mut self, v: u8) -> io::Result<()> {
///         self.buffer.push(v);
///         Ok(())
///     }
///
///     fn emit_raw_bytes(&mut self, s: &[u8]) -> io::Result<()> {
///         self.buffer.extend_from_slice(s);
///         Ok(())
///     }
/// }
/// ```
pub trait Encoder {
    // =========================================================================
    // Required methods - these must be implemented by all encoders
    // =========================================================================

    /// Emits a single unsigned byte.
    fn emit_u8(&mut self, v: u8) -> io::Result<()>;

    /// Emits raw bytes directly to the output.
    fn emit_raw_bytes(&mut self, s: &[u8]) -> io::Result<()>;

    // =========================================================================
    // Default implementations - can be overridden for optimization
    // =========================================================================

    /// Emits a boolean as `1u8` or `0u8`.
    fn emit_bool(&mut self, v: bool) -> io::Result<()> {
        self.emit_u8(u8::from(v))
    }

    /// Emits a 16-bit unsigned integer in little-endian format.
    fn emit_u16(&mut self, v: u16) -> io::Result<()> {
        self.emit_raw_bytes(&v.to_le_bytes())
    }

    /// Emits a 32-bit unsigned integer in little-endian format.
    fn emit_u32(&mut self, v: u32) -> io::Result<()> {
        self.emit_raw_bytes(&v.to_le_bytes())
    }

    /// Emits a 64-bit unsigned integer in little-endian format.
    fn emit_u64(&mut self, v: u64) -> io::Result<()> {
        self.emit_raw_bytes(&v.to_le_bytes())
    }

    /// Emits a 128-bit unsigned integer in little-endian format.
    fn emit_u128(&mut self, v: u128) -> io::Result<()> {
        self.emit_raw_bytes(&v.to_le_bytes())
    }

    /// Emits a single signed byte.
    fn emit_i8(&mut self, v: i8) -> io::Result<()> {
        self.emit_raw_bytes(&v.to_le_bytes())
    }

    /// Emits a 16-bit signed integer in little-endian format.
    fn emit_i16(&mut self, v: i16) -> io::Result<()> {
        self.emit_raw_bytes(&v.to_le_bytes())
    }

    /// Emits a 32-bit signed integer in little-endian format.
    fn emit_i32(&mut self, v: i32) -> io::Result<()> {
        self.emit_raw_bytes(&v.to_le_bytes())
    }

    /// Emits a 64-bit signed integer in little-endian format.
    fn emit_i64(&mut self, v: i64) -> io::Result<()> {
        self.emit_raw_bytes(&v.to_le_bytes())
    }

    /// Emits a 128-bit signed integer in little-endian format.
    fn emit_i128(&mut self, v: i128) -> io::Result<()> {
        self.emit_raw_bytes(&v.to_le_bytes())
    }

    /// Emits a Unicode character as its 32-bit scalar value.
    fn emit_char(&mut self, v: char) -> io::Result<()> {
        self.emit_u32(u32::from(v))
    }

    /// Emits a 32-bit floating-point number.
    fn emit_f32(&mut self, v: f32) -> io::Result<()> {
        self.emit_raw_bytes(&v.to_le_bytes())
    }

    /// Emits a 64-bit floating-point number.
    fn emit_f64(&mut self, v: f64) -> io::Result<()> {
        self.emit_raw_bytes(&v.to_le_bytes())
    }

    /// Emits an unsigned integer as a LEB128 varint.
    fn emit_varint(&mut self, v: u64) -> io::Result<()> {
        let mut buf = [0u8; wire::MAX_VARINT_BYTES];
        let len = wire::encode_varint(v, &mut buf);
        self.emit_raw_bytes(&buf[..len])
    }

    /// Emits a length or index as a varint.
    fn emit_len(&mut self, v: usize) -> io::Result<()> {
        self.emit_varint(v as u64)
    }

    /// Emits a string slice as its varint length followed by UTF-8 bytes.
    fn emit_str(&mut self, v: &str) -> io::Result<()> {
        self.emit_len(v.len())?;
        self.emit_raw_bytes(v.as_bytes())
    }

    /// Emits a byte slice as its varint length followed by the raw bytes.
    fn emit_bytes(&mut self, v: &[u8]) -> io::Result<()> {
        self.emit_len(v.len())?;
        self.emit_raw_bytes(v)
    }
}

/// A trait for types that can be written into a [`GraphWriter`].
///
/// Field values of self-describing types are written through this trait.
/// Shared objects (`Arc<T>` of a [`Persist`](crate::Persist) type) go
/// through the writer's reference table; plain values are written inline.
///
/// # Example
///
/// ```ignore
/// use skein_serialize::{Encode, Encoder, GraphWriter, Result};
///
/// struct Point { x: i32, y: i32 }
///
/// impl Encode for Point {
///     fn encode(&self, writer: &mut GraphWriter<'_>) -> Result<()> {
///         writer.emit_i32(self.x)?;
///         writer.emit_i32(self.y)?;
///         Ok(())
///     }
/// }
/// ```
pub trait Encode {
    /// Writes `self` into the writer.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream fails or a nested value has no usable
    /// driver.
    fn encode(&self, writer: &mut GraphWriter<'_>) -> Result<()>;

    /// Writes an optional value.
    ///
    /// The default writes a presence flag followed by the value. Types with
    /// a natural null representation override this.
    ///
    /// # Errors
    ///
    /// See [`Encode::encode`].
    fn encode_option(
        value: Option<&Self>,
        writer: &mut GraphWriter<'_>,
    ) -> Result<()>
    where
        Self: Sized,
    {
        match value {
            Some(value) => {
                writer.emit_bool(true)?;
                value.encode(writer)
            }
            None => Ok(writer.emit_bool(false)?),
        }
    }
}

impl<T: Encode + ?Sized> Encode for &T {
    fn encode(&self, writer: &mut GraphWriter<'_>) -> Result<()> {
        (**self).encode(writer)
    }
}

impl<T: Encode + ?Sized> Encode for Box<T> {
    fn encode(&self, writer: &mut GraphWriter<'_>) -> Result<()> {
        (**self).encode(writer)
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode(&self, writer: &mut GraphWriter<'_>) -> Result<()> {
        T::encode_option(self.as_ref(), writer)
    }
}

impl Encode for str {
    fn encode(&self, writer: &mut GraphWriter<'_>) -> Result<()> {
        Ok(writer.emit_str(self)?)
    }
}

/// A polymorphic slot: any value with its own marker.
impl Encode for Value {
    fn encode(&self, writer: &mut GraphWriter<'_>) -> Result<()> {
        writer.write_value(self)
    }
}

/// A shared string, tracked by identity like any other shared instance.
impl Encode for Arc<str> {
    fn encode(&self, writer: &mut GraphWriter<'_>) -> Result<()> {
        writer.write_string(self)
    }

    fn encode_option(
        value: Option<&Self>,
        writer: &mut GraphWriter<'_>,
    ) -> Result<()> {
        match value {
            Some(string) => writer.write_string(string),
            None => writer.write_value(&Value::Null),
        }
    }
}

impl Encode for () {
    fn encode(&self, _: &mut GraphWriter<'_>) -> Result<()> { Ok(()) }
}

macro_rules! impl_encode_tuple {
    ($($name:ident : $idx:tt),+) => {
        impl<$($name: Encode),+> Encode for ($($name,)+) {
            fn encode(&self, writer: &mut GraphWriter<'_>) -> Result<()> {
                $(self.$idx.encode(writer)?;)+
                Ok(())
            }
        }
    };
}

impl_encode_tuple!(A: 0, B: 1);
impl_encode_tuple!(A: 0, B: 1, C: 2);
impl_encode_tuple!(A: 0, B: 1, C: 2, D: 3);
