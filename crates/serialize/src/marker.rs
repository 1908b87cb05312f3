//! Leading byte tags of the stream format.
//!
//! Every value starts with a [`Marker`]. Scalars listed here are inlined
//! directly after their marker; everything else goes through the uniform
//! object path (`Object`, `EmptyObject`, `Reference`). Type descriptors use
//! their own small [`TypeCode`] alphabet.

use crate::error::Error;

/// The byte that introduces a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Marker {
    /// The null value.
    Null = 0x00,

    /// A length-prefixed UTF-8 string; assigns the next object index.
    String = 0x01,

    /// A little-endian `i32`.
    Int32 = 0x02,

    /// A little-endian `f64`.
    Double = 0x03,

    /// A Unicode scalar value as a little-endian `u32`.
    Char = 0x04,

    /// A little-endian `u32`.
    UInt32 = 0x05,

    /// A little-endian `f32`.
    Float = 0x06,

    /// A UTC timestamp in ticks.
    DateTime = 0x07,

    /// Sixteen raw bytes.
    Guid = 0x08,

    /// A signed duration in ticks.
    TimeSpan = 0x09,

    /// A UTC timestamp in ticks followed by the offset in minutes.
    DateTimeOffset = 0x0A,

    /// A debug sentinel; only present when sentinels are enabled.
    Sentinel = 0xFC,

    /// A back-reference to an already assigned object index.
    Reference = 0xFD,

    /// A contentless root instance; assigns the next object index.
    EmptyObject = 0xFE,

    /// A type-described object; assigns the next object index.
    Object = 0xFF,
}

impl TryFrom<u8> for Marker {
    type Error = Error;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Ok(match byte {
            0x00 => Self::Null,
            0x01 => Self::String,
            0x02 => Self::Int32,
            0x03 => Self::Double,
            0x04 => Self::Char,
            0x05 => Self::UInt32,
            0x06 => Self::Float,
            0x07 => Self::DateTime,
            0x08 => Self::Guid,
            0x09 => Self::TimeSpan,
            0x0A => Self::DateTimeOffset,
            0xFC => Self::Sentinel,
            0xFD => Self::Reference,
            0xFE => Self::EmptyObject,
            0xFF => Self::Object,
            other => return Err(Error::InvalidMarker(other)),
        })
    }
}

impl From<Marker> for u8 {
    fn from(marker: Marker) -> Self { marker as Self }
}

/// The byte that introduces a type descriptor reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeCode {
    /// No type; terminates the chain of an external type.
    Null = 0,

    /// The object root; terminates the chain of a self-describing type.
    Root = 1,

    /// A type seen for the first time: name, version, then its base.
    Simple = 2,

    /// A type already interned in this stream, by index.
    Known = 3,
}

impl TryFrom<u8> for TypeCode {
    type Error = Error;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Ok(match byte {
            0 => Self::Null,
            1 => Self::Root,
            2 => Self::Simple,
            3 => Self::Known,
            other => return Err(Error::InvalidTypeCode(other)),
        })
    }
}

impl From<TypeCode> for u8 {
    fn from(code: TypeCode) -> Self { code as Self }
}
