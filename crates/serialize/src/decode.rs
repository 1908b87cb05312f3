//! Decoding traits.
//!
//! [`Decoder`] is the byte-level source every reader implements; [`Decode`]
//! is implemented by types that know how to read themselves from a
//! [`GraphReader`].

use std::{io, sync::Arc};

use crate::{
    error::{Error, Result},
    reader::GraphReader,
    value::Value,
};

/// Strings and byte buffers are read in chunks of this size so a corrupted
/// length cannot trigger a huge allocation up front.
const READ_CHUNK: usize = 8 * 1024;

fn invalid_data(message: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

macro_rules! read_fixed {
    ($($(#[$meta:meta])* $name:ident -> $ty:ty;)*) => {
        $(
            $(#[$meta])*
            fn $name(&mut self) -> io::Result<$ty> {
                let mut buf = [0u8; size_of::<$ty>()];
                self.read_exact_into(&mut buf)?;
                Ok(<$ty>::from_le_bytes(buf))
            }
        )*
    };
}

/// A trait for sources that can read primitive values.
///
/// This mirrors [`Encoder`](crate::Encoder): only
/// [`read_u8`](Decoder::read_u8) and
/// [`read_exact_into`](Decoder::read_exact_into) are required.
pub trait Decoder {
    // =========================================================================
    // Required methods - these must be implemented by all decoders
    // =========================================================================

    /// Reads a single unsigned byte.
    fn read_u8(&mut self) -> io::Result<u8>;

    /// Fills `buf` completely from the input.
    fn read_exact_into(&mut self, buf: &mut [u8]) -> io::Result<()>;

    // =========================================================================
    // Default implementations - can be overridden for optimization
    // =========================================================================

    read_fixed! {
        /// Reads a little-endian `u16`.
        read_u16 -> u16;
        /// Reads a little-endian `u32`.
        read_u32 -> u32;
        /// Reads a little-endian `u64`.
        read_u64 -> u64;
        /// Reads a little-endian `u128`.
        read_u128 -> u128;
        /// Reads a single signed byte.
        read_i8 -> i8;
        /// Reads a little-endian `i16`.
        read_i16 -> i16;
        /// Reads a little-endian `i32`.
        read_i32 -> i32;
        /// Reads a little-endian `i64`.
        read_i64 -> i64;
        /// Reads a little-endian `i128`.
        read_i128 -> i128;
        /// Reads a little-endian `f32`.
        read_f32 -> f32;
        /// Reads a little-endian `f64`.
        read_f64 -> f64;
    }

    /// Reads a boolean; any byte other than `0` or `1` is invalid.
    fn read_bool(&mut self) -> io::Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(invalid_data("invalid boolean byte")),
        }
    }

    /// Reads a Unicode scalar value.
    fn read_char(&mut self) -> io::Result<char> {
        char::from_u32(self.read_u32()?)
            .ok_or_else(|| invalid_data("invalid unicode scalar value"))
    }

    /// Reads a LEB128 varint.
    fn read_varint(&mut self) -> io::Result<u64> {
        let mut result: u64 = 0;
        let mut shift = 0;

        loop {
            let byte = self.read_u8()?;

            if shift >= 64 {
                return Err(invalid_data("varint too long for u64"));
            }

            result |= u64::from(byte & 0x7F) << shift;

            if byte & 0x80 == 0 {
                return Ok(result);
            }

            shift += 7;
        }
    }

    /// Reads a varint length or index.
    fn read_len(&mut self) -> io::Result<usize> {
        usize::try_from(self.read_varint()?)
            .map_err(|_| invalid_data("length does not fit in usize"))
    }

    /// Reads a varint-length-prefixed byte buffer.
    fn read_bytes(&mut self) -> io::Result<Vec<u8>> {
        let len = self.read_len()?;
        let mut bytes = Vec::with_capacity(len.min(READ_CHUNK));
        let mut chunk = [0u8; READ_CHUNK];
        let mut remaining = len;

        while remaining > 0 {
            let take = remaining.min(READ_CHUNK);
            self.read_exact_into(&mut chunk[..take])?;
            bytes.extend_from_slice(&chunk[..take]);
            remaining -= take;
        }

        Ok(bytes)
    }

    /// Reads a varint-length-prefixed UTF-8 string.
    fn read_string(&mut self) -> io::Result<String> {
        String::from_utf8(self.read_bytes()?)
            .map_err(|_| invalid_data("string is not valid UTF-8"))
    }
}

/// A trait for types that can be read from a [`GraphReader`].
///
/// Implementations must consume exactly the bytes the paired
/// [`Encode`](crate::Encode) implementation produced.
pub trait Decode: Sized {
    /// Reads a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is malformed, ends early, or names a
    /// type the registry cannot resolve.
    fn decode(reader: &mut GraphReader<'_>) -> Result<Self>;

    /// Reads an optional value written by
    /// [`Encode::encode_option`](crate::Encode::encode_option).
    ///
    /// # Errors
    ///
    /// See [`Decode::decode`].
    fn decode_option(reader: &mut GraphReader<'_>) -> Result<Option<Self>> {
        if reader.read_bool()? {
            Self::decode(reader).map(Some)
        } else {
            Ok(None)
        }
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode(reader: &mut GraphReader<'_>) -> Result<Self> {
        T::decode_option(reader)
    }
}

impl<T: Decode> Decode for Box<T> {
    fn decode(reader: &mut GraphReader<'_>) -> Result<Self> {
        T::decode(reader).map(Self::new)
    }
}

impl Decode for Value {
    fn decode(reader: &mut GraphReader<'_>) -> Result<Self> {
        reader.read_value()
    }
}

impl Decode for Arc<str> {
    fn decode(reader: &mut GraphReader<'_>) -> Result<Self> {
        Self::decode_option(reader)?.ok_or_else(|| Error::TypeMismatch {
            expected: "string".to_owned(),
            found: "null".to_owned(),
        })
    }

    fn decode_option(reader: &mut GraphReader<'_>) -> Result<Option<Self>> {
        match reader.read_value()? {
            Value::Null => Ok(None),
            Value::String(string) => Ok(Some(string)),
            other => Err(Error::TypeMismatch {
                expected: "string".to_owned(),
                found: other.kind().to_owned(),
            }),
        }
    }
}

impl Decode for () {
    fn decode(_: &mut GraphReader<'_>) -> Result<Self> { Ok(()) }
}

macro_rules! impl_decode_tuple {
    ($($name:ident),+) => {
        impl<$($name: Decode),+> Decode for ($($name,)+) {
            fn decode(reader: &mut GraphReader<'_>) -> Result<Self> {
                Ok(($($name::decode(reader)?,)+))
            }
        }
    };
}

impl_decode_tuple!(A, B);
impl_decode_tuple!(A, B, C);
impl_decode_tuple!(A, B, C, D);
