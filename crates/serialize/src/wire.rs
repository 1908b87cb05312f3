//! Byte-level stream adapters.
//!
//! [`WireEncoder`] and [`WireDecoder`] implement the [`Encoder`] and
//! [`Decoder`] traits on top of any [`Write`] or [`Read`] implementation and
//! keep track of the current stream position for diagnostics.
//!
//! # Format Overview
//!
//! - **Fixed-size integers**: little-endian, two's complement.
//! - **Floating-point**: little-endian IEEE 754.
//! - **Indices, lengths and versions**: LEB128 varints, so the common small
//!   values take a single byte.
//! - **Strings/bytes**: varint length followed by the raw bytes.
//!
//! # Example
//!
//! ```ignore
//! use skein_serialize::{Decoder, Encoder, wire::{WireDecoder, WireEncoder}};
//!
//! let mut encoder = WireEncoder::new(Vec::new());
//! encoder.emit_varint(300)?;
//! let bytes = encoder.into_inner();
//!
//! let mut decoder = WireDecoder::new(&bytes[..]);
//! assert_eq!(decoder.read_varint()?, 300);
//! ```

use std::io::{self, Read, Write};

use crate::{Decoder, Encoder};

#[cfg(test)]
mod test;

// =============================================================================
// Varint helper functions
// =============================================================================

/// Maximum number of bytes of a varint-encoded `u64`.
pub(crate) const MAX_VARINT_BYTES: usize = 10;

/// Encodes an unsigned 64-bit integer as a varint into the buffer.
/// Returns the number of bytes written.
#[inline]
#[allow(clippy::cast_possible_truncation)]
pub(crate) const fn encode_varint(
    mut value: u64,
    buf: &mut [u8; MAX_VARINT_BYTES],
) -> usize {
    let mut i = 0;
    while value >= 0x80 {
        buf[i] = (value as u8) | 0x80;
        value >>= 7;
        i += 1;
    }
    buf[i] = value as u8;
    i + 1
}

/// Number of bytes [`encode_varint`] produces for `value`.
#[must_use]
pub const fn varint_len(mut value: u64) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

// =============================================================================
// WireEncoder
// =============================================================================

/// An encoder that writes to any [`Write`] implementation.
///
/// # Type Parameters
///
/// * `W` - The writer type that implements [`std::io::Write`].
#[derive(Debug)]
pub struct WireEncoder<W> {
    writer: W,
    position: u64,
}

impl<W> WireEncoder<W> {
    /// Creates a new encoder wrapping the given writer.
    #[must_use]
    pub const fn new(writer: W) -> Self { Self { writer, position: 0 } }

    /// Returns the number of bytes written so far.
    #[must_use]
    pub const fn position(&self) -> u64 { self.position }

    /// Returns a reference to the underlying writer.
    #[must_use]
    pub const fn get_ref(&self) -> &W { &self.writer }

    /// Consumes the encoder and returns the underlying writer.
    #[must_use]
    pub fn into_inner(self) -> W { self.writer }
}

impl<W: Write> WireEncoder<W> {
    /// Flushes the underlying writer.
    ///
    /// # Errors
    ///
    /// Propagates the writer's error.
    pub fn flush(&mut self) -> io::Result<()> { self.writer.flush() }
}

impl<W: Write> Encoder for WireEncoder<W> {
    fn emit_u8(&mut self, v: u8) -> io::Result<()> {
        self.writer.write_all(&[v])?;
        self.position += 1;
        Ok(())
    }

    fn emit_raw_bytes(&mut self, s: &[u8]) -> io::Result<()> {
        self.writer.write_all(s)?;
        self.position += s.len() as u64;
        Ok(())
    }
}

// =============================================================================
// WireDecoder
// =============================================================================

/// A decoder that reads from any [`Read`] implementation.
///
/// # Type Parameters
///
/// * `R` - The reader type that implements [`std::io::Read`].
#[derive(Debug)]
pub struct WireDecoder<R> {
    reader: R,
    position: u64,
}

impl<R> WireDecoder<R> {
    /// Creates a new decoder wrapping the given reader.
    #[must_use]
    pub const fn new(reader: R) -> Self { Self { reader, position: 0 } }

    /// Returns the number of bytes consumed so far.
    #[must_use]
    pub const fn position(&self) -> u64 { self.position }

    /// Returns a reference to the underlying reader.
    #[must_use]
    pub const fn get_ref(&self) -> &R { &self.reader }

    /// Consumes the decoder and returns the underlying reader.
    #[must_use]
    pub fn into_inner(self) -> R { self.reader }
}

impl<R: Read> Decoder for WireDecoder<R> {
    fn read_u8(&mut self) -> io::Result<u8> {
        let mut buf = [0u8; 1];
        self.reader.read_exact(&mut buf)?;
        self.position += 1;
        Ok(buf[0])
    }

    fn read_exact_into(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.reader.read_exact(buf)?;
        self.position += buf.len() as u64;
        Ok(())
    }
}
