//! Error type shared by every operation of the codec.
//!
//! No error is recovered from internally: any failure aborts the current
//! write or read session and the partially produced stream or graph must be
//! discarded.

use std::{fmt, io, panic::Location};

/// A convenient alias with [`Error`] as the default error type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The capabilities a [`Driver`](crate::Driver) may supply for a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Producing bytes from an instance.
    Serialize,

    /// Producing an instance from bytes.
    Deserialize,

    /// Flattening an instance into [`Properties`](crate::Properties).
    Export,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serialize => f.write_str("serialize"),
            Self::Deserialize => f.write_str("deserialize"),
            Self::Export => f.write_str("export"),
        }
    }
}

/// Every way a write or read session can fail.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The underlying stream failed.
    #[error("stream error: {0}")]
    Io(#[from] io::Error),

    /// A value's runtime type has no driver and was never registered.
    #[error("no driver is registered for type `{type_name}`")]
    MissingDriver {
        /// The type that has no driver.
        type_name: String,
    },

    /// A driver exists but does not supply the requested capability.
    #[error("type `{type_name}` does not support {capability}")]
    MissingCapability {
        /// The type whose driver lacks the capability.
        type_name: String,

        /// The capability that was requested.
        capability: Capability,
    },

    /// A self-describing type declares an unusable shape.
    #[error("invalid declaration of `{type_name}`: {reason}")]
    InvalidDeclaration {
        /// The offending type.
        type_name: String,

        /// What is wrong with the declaration.
        reason: String,
    },

    /// Two drivers compete for the same type or the same stable name.
    #[error("ambiguous declaration of `{type_name}`: {reason}")]
    AmbiguousDeclaration {
        /// The contested type or name.
        type_name: String,

        /// The nature of the conflict.
        reason: String,
    },

    /// The stream names a type that the local registry cannot resolve.
    #[error("type `{type_name}` is no longer serializable")]
    UnknownType {
        /// The type name recorded in the stream.
        type_name: String,
    },

    /// The stream's layout for a type disagrees with the local declaration.
    #[error("layout of `{type_name}` does not match the stream: {reason}")]
    LayoutMismatch {
        /// The type being read.
        type_name: String,

        /// How the layouts disagree.
        reason: String,
    },

    /// A leading value marker byte is not recognized.
    #[error("invalid marker byte {0:#04x}")]
    InvalidMarker(u8),

    /// A type descriptor code byte is not recognized.
    #[error("invalid type descriptor code {0:#04x}")]
    InvalidTypeCode(u8),

    /// A reference still points to an empty slot after all deferred actions
    /// ran.
    #[error("reference to object #{index} was never resolved")]
    UnresolvedReference {
        /// The object table index that stayed empty.
        index: usize,
    },

    /// A reference to an object under construction was written or read
    /// where the value is needed immediately.
    #[error(
        "object #{index} is still under construction; hold it through a \
         `Link` to allow cycles"
    )]
    CyclicReference {
        /// The object table index under construction.
        index: usize,
    },

    /// A value of an unexpected type was read.
    #[error("expected a value of type `{expected}`, found `{found}`")]
    TypeMismatch {
        /// The type the caller asked for.
        expected: String,

        /// What the stream actually produced.
        found: String,
    },

    /// An object's recorded index does not equal the next table slot.
    #[error("object index {found} is out of order; expected {expected}")]
    IndexMismatch {
        /// The next free slot of the object table.
        expected: usize,

        /// The index recorded in the stream.
        found: usize,
    },

    /// A debug sentinel did not match; writer and reader drifted apart.
    #[error(
        "sentinel mismatch at {location}: expected {expected:#010x}, found \
         {found:?}"
    )]
    SentinelMismatch {
        /// The tag the reader expected.
        expected: u32,

        /// The tag found in the stream, if a sentinel was there at all.
        found: Option<u32>,

        /// Where the mismatching read was requested.
        location: &'static Location<'static>,
    },

    /// The graph nests deeper than the configured limit.
    #[error("object graph nests deeper than {limit} levels")]
    DepthExceeded {
        /// The configured limit.
        limit: usize,
    },

    /// The stream content is malformed in some other way.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Re-serializing a freshly read graph did not reproduce it.
    #[error("re-serialized graph differs from the original")]
    NotIdempotent,
}

impl Error {
    pub(crate) fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData(message.into())
    }

    /// Returns `true` if the error is caused by a misdeclared or
    /// unregistered type rather than by the stream content.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingDriver { .. }
                | Self::MissingCapability { .. }
                | Self::InvalidDeclaration { .. }
                | Self::AmbiguousDeclaration { .. }
        )
    }
}
