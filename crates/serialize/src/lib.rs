//! Skein Serialization Library
//!
//! This crate turns arbitrary, cyclic, polymorphic object graphs into a
//! compact binary stream and back, while letting each type evolve its
//! on-disk layout independently through per-level version tags.
//!
//! # Overview
//!
//! - [`Registry`]: the concurrent driver cache. Every runtime type that can
//!   appear in a stream has one [`Driver`] bundling its
//!   [`TypeDescriptor`] and its serialize, deserialize and export
//!   capabilities.
//! - [`GraphWriter`] / [`GraphReader`]: one stream session each. They own
//!   the reference table, the object table and the type-descriptor table.
//! - [`Persist`]: implemented (usually derived) by self-describing types.
//!   Write and read steps run from the root ancestor to the leaf, and each
//!   read step receives the version the stream recorded for its level.
//! - [`Encode`] / [`Decode`]: inline value types and containers.
//! - [`Value`]: the dynamically typed root and polymorphic slot.
//!
//! # Stream Layout
//!
//! ```text
//! Stream := Value*
//! Value  := 0x00                          ; Null
//!         | 0x01 String                   ; shared string, assigns index
//!         | 0x02..=0x0A Scalar            ; inlined scalars
//!         | 0xFD VarInt                   ; Reference -> object index
//!         | 0xFE VarInt                   ; EmptyObject, assigns index
//!         | 0xFF VarInt TypeDescRef Data  ; Object, assigns index
//! ```
//!
//! # Derive Macros
//!
//! ```ignore
//! use skein_serialize::{Link, Persist};
//!
//! #[derive(Persist)]
//! #[persist(version = 1, name = "people.Person")]
//! struct Person {
//!     name: String,
//!     #[persist(since = 1)]
//!     email: Option<String>,
//!     #[persist(skip)]
//!     cache: Vec<u8>,
//! }
//!
//! #[derive(Persist)]
//! #[persist(version = 0, name = "people.Employee", export)]
//! struct Employee {
//!     #[persist(base)]
//!     person: Person,
//!     manager: Link<Employee>,
//! }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use skein_serialize::{Registry, Value};
//!
//! let registry = Registry::global();
//! registry.resolve::<Person>()?;
//!
//! let person = Arc::new(Person::new("Ada"));
//! let bytes = skein_serialize::to_bytes(&Value::shared(&person), registry)?;
//! let back = skein_serialize::from_bytes(&bytes, registry)?
//!     .downcast::<Person>()?;
//! ```

// Allow derive macros to reference this crate as `skein_serialize` internally
extern crate self as skein_serialize;

pub mod containers;
pub mod decode;
pub mod descriptor;
pub mod driver;
pub mod encode;
pub mod enumeration;
pub mod error;
pub mod export;
pub mod link;
pub mod marker;
pub mod options;
pub mod persist;
pub mod primitives;
pub mod reader;
pub mod registry;
pub mod shared_map;
pub mod value;
pub mod wire;
pub mod writer;

use std::{
    io::{Read, Write},
    sync::Arc,
};

// Re-export main traits and types at the crate root for convenience
pub use containers::{Comparer, Element};
pub use decode::{Decode, Decoder};
pub use descriptor::{TypeDescriptor, TypeLevel, TypeRef};
pub use driver::{Driver, DriverKind, ExternalDriver};
pub use encode::{Encode, Encoder};
pub use enumeration::{Integral, PersistEnum};
pub use error::{Capability, Error, Result};
pub use export::{Export, Properties};
pub use link::Link;
pub use marker::{Marker, TypeCode};
pub use options::Options;
pub use persist::{Level, Persist, Root};
pub use primitives::{Decimal, Primitive};
pub use reader::{Fetched, GraphReader, ObjectTable};
pub use registry::Registry;
pub use shared_map::SharedMap;
// Re-export derive macros
pub use skein_serialize_derive::{Decode, Encode, Persist, PersistEnum};
pub use value::{Instance, Object, Value};
pub use wire::{WireDecoder, WireEncoder};
pub use writer::GraphWriter;

/// Writes the graph reachable from `root` into `stream`.
///
/// Instances of self-describing types must have their driver resolved (for
/// example with [`Registry::resolve`]) before they can be written through
/// a type-erased [`Value::Object`].
///
/// # Errors
///
/// Returns [`Error::MissingDriver`] or [`Error::MissingCapability`] if a
/// reachable instance cannot be serialized, or an I/O error of the stream.
pub fn serialize(
    stream: &mut dyn Write,
    root: &Value,
    registry: &Registry,
) -> Result<()> {
    serialize_with(stream, root, registry, Options::default())
}

/// [`serialize`] with explicit [`Options`].
///
/// # Errors
///
/// See [`serialize`].
#[tracing::instrument(skip_all, fields(sentinels = options.sentinels()))]
pub fn serialize_with(
    stream: &mut dyn Write,
    root: &Value,
    registry: &Registry,
    options: Options,
) -> Result<()> {
    let mut writer = GraphWriter::with_options(stream, registry, options);
    writer.write_value(root)?;
    writer.finish()
}

/// Reads one graph from `stream`.
///
/// # Errors
///
/// Returns [`Error::UnknownType`] if the stream names a type the registry
/// cannot resolve, [`Error::UnresolvedReference`] or
/// [`Error::CyclicReference`] if a reference cannot be satisfied, or any
/// error of the drivers involved.
pub fn deserialize(
    stream: &mut dyn Read,
    registry: &Registry,
) -> Result<Value> {
    deserialize_with(stream, registry, Options::default())
}

/// [`deserialize`] with explicit [`Options`].
///
/// # Errors
///
/// See [`deserialize`].
#[tracing::instrument(skip_all, fields(sentinels = options.sentinels()))]
pub fn deserialize_with(
    stream: &mut dyn Read,
    registry: &Registry,
    options: Options,
) -> Result<Value> {
    let mut reader = GraphReader::with_options(stream, registry, options);
    let value = reader.read_value()?;
    reader.finish()?;
    Ok(value)
}

/// Serializes a graph into a new buffer.
///
/// # Errors
///
/// See [`serialize`].
pub fn to_bytes(root: &Value, registry: &Registry) -> Result<Vec<u8>> {
    to_bytes_with(root, registry, Options::default())
}

/// [`to_bytes`] with explicit [`Options`].
///
/// # Errors
///
/// See [`serialize`].
pub fn to_bytes_with(
    root: &Value,
    registry: &Registry,
    options: Options,
) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    serialize_with(&mut bytes, root, registry, options)?;
    Ok(bytes)
}

/// Deserializes a graph from a buffer holding exactly one graph.
///
/// # Errors
///
/// See [`deserialize`]. Also fails with [`Error::InvalidData`] if bytes
/// remain after the graph.
pub fn from_bytes(bytes: &[u8], registry: &Registry) -> Result<Value> {
    from_bytes_with(bytes, registry, Options::default())
}

/// [`from_bytes`] with explicit [`Options`].
///
/// # Errors
///
/// See [`from_bytes`].
pub fn from_bytes_with(
    bytes: &[u8],
    registry: &Registry,
    options: Options,
) -> Result<Value> {
    let mut stream = bytes;
    let value = deserialize_with(&mut stream, registry, options)?;

    if !stream.is_empty() {
        return Err(Error::InvalidData(format!(
            "{} trailing bytes after the graph",
            stream.len()
        )));
    }

    Ok(value)
}

/// Registers a driver for a type that cannot describe itself in the
/// process-wide registry.
///
/// # Errors
///
/// See [`Registry::register_external`].
pub fn register_external_driver<T: std::any::Any + Send + Sync>(
    driver: ExternalDriver<T>,
) -> Result<Arc<Driver>> {
    Registry::global().register_external(driver)
}

/// Checks that re-serializing a freshly deserialized copy of `value`
/// reproduces the original stream byte for byte, and returns the copy.
///
/// A `HashMap` with more than one entry may iterate in a different order in
/// the copy, so graphs holding one can fail the check; types meant to be
/// checked should prefer `BTreeMap`.
///
/// # Errors
///
/// Returns [`Error::NotIdempotent`] if the streams differ, or any error of
/// the round trip.
pub fn check_idempotent<T: Persist>(
    value: &Arc<T>,
    registry: &Registry,
) -> Result<Arc<T>> {
    registry.resolve::<T>()?;

    let first = to_bytes(&Value::shared(value), registry)?;
    let copy = from_bytes(&first, registry)?.downcast::<T>()?;
    let second = to_bytes(&Value::shared(&copy), registry)?;

    if first == second {
        tracing::trace!(
            type_name = T::TYPE_NAME,
            bytes = first.len(),
            "graph is idempotent"
        );
        Ok(copy)
    } else {
        Err(Error::NotIdempotent)
    }
}
