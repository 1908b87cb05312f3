//! Self-describing types.
//!
//! A type becomes self-describing by implementing [`Persist`], usually via
//! `#[derive(Persist)]`. It declares a stable name, a version, an optional
//! embedded ancestor (its [`Base`](Persist::Base)) and a paired write/read
//! step for its own fields. The registry turns the chain of ancestors into a
//! [`TypePath`](crate::TypeDescriptor::path): write steps run from the root
//! ancestor to the leaf, and read steps run in the same order, each
//! receiving the version the stream recorded for its own level.
//!
//! ```ignore
//! #[derive(Persist)]
//! #[persist(version = 1, name = "zoo.Animal")]
//! struct Animal {
//!     name: String,
//! }
//!
//! #[derive(Persist)]
//! #[persist(version = 0, name = "zoo.Dog")]
//! struct Dog {
//!     #[persist(base)]
//!     animal: Animal,
//!     good: bool,
//! }
//! ```

use std::{any::TypeId, sync::Arc};

use crate::{
    decode::Decode,
    descriptor::{TypeDescriptor, TypeLevel},
    encode::Encode,
    error::{Error, Result},
    export::Properties,
    reader::GraphReader,
    registry::Registry,
    writer::GraphWriter,
};

/// The contentless root of every type hierarchy.
///
/// As a base it terminates the chain of ancestors. As a value it is the bare
/// "object" instance, written as an `EmptyObject` marker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Root;

impl Root {
    /// The stable name of the root type.
    pub const TYPE_NAME: &'static str = "object";
}

/// A type that declares its own binary layout.
///
/// All three parts of the declaration are mandatory: the
/// [`VERSION`](Persist::VERSION) tag, the [`write`](Persist::write) step and
/// the [`read`](Persist::read) constructor. The derive macro reports a
/// partial declaration at compile time.
pub trait Persist: Sized + Send + Sync + 'static {
    /// The name recorded in streams. Must be unique within a registry and
    /// stable across builds.
    const TYPE_NAME: &'static str;

    /// The current version of this level's layout.
    const VERSION: u32;

    /// Whether the type supplies the export capability.
    const EXPORTS: bool = false;

    /// The embedded ancestor, or [`Root`].
    type Base: Level;

    /// Borrows the embedded ancestor.
    fn base(&self) -> &Self::Base;

    /// Writes this level's fields. Ancestor levels are written before this
    /// is called.
    ///
    /// # Errors
    ///
    /// Returns an error if a field cannot be written.
    fn write(&self, writer: &mut GraphWriter<'_>) -> Result<()>;

    /// Reads this level's fields, given the already reconstructed ancestor
    /// and the version the stream recorded for this level.
    ///
    /// # Errors
    ///
    /// Returns an error if a field cannot be read.
    fn read(
        base: Self::Base,
        reader: &mut GraphReader<'_>,
        version: u32,
    ) -> Result<Self>;

    /// Adds this level's properties. Ancestor levels are exported first.
    ///
    /// # Errors
    ///
    /// Returns an error if a property cannot be produced.
    fn export(&self, properties: &mut Properties) -> Result<()> {
        let _ = properties;
        Ok(())
    }
}

/// One link of an ancestor chain: either [`Root`] or a [`Persist`] type.
///
/// Implemented automatically; the methods sequence the per-level steps of
/// [`Persist`] from the root ancestor to the leaf.
pub trait Level: Sized + Send + Sync + 'static {
    #[doc(hidden)]
    fn level_descriptor(
        registry: &Registry,
        visiting: &mut Vec<TypeId>,
    ) -> Result<Option<Arc<TypeDescriptor>>>;

    #[doc(hidden)]
    fn write_levels(&self, writer: &mut GraphWriter<'_>) -> Result<()>;

    #[doc(hidden)]
    fn read_levels(
        reader: &mut GraphReader<'_>,
        path: &[TypeLevel],
    ) -> Result<Self>;

    #[doc(hidden)]
    fn export_levels(&self, properties: &mut Properties) -> Result<()>;
}

impl Level for Root {
    fn level_descriptor(
        _: &Registry,
        _: &mut Vec<TypeId>,
    ) -> Result<Option<Arc<TypeDescriptor>>> {
        Ok(None)
    }

    fn write_levels(&self, _: &mut GraphWriter<'_>) -> Result<()> { Ok(()) }

    fn read_levels(
        _: &mut GraphReader<'_>,
        path: &[TypeLevel],
    ) -> Result<Self> {
        match path.last() {
            None => Ok(Self),
            Some(level) => Err(Error::LayoutMismatch {
                type_name: level.name.to_string(),
                reason: "the stream records an ancestor level that the \
                         local type does not have"
                    .to_owned(),
            }),
        }
    }

    fn export_levels(&self, _: &mut Properties) -> Result<()> { Ok(()) }
}

impl<T: Persist> Level for T {
    fn level_descriptor(
        registry: &Registry,
        visiting: &mut Vec<TypeId>,
    ) -> Result<Option<Arc<TypeDescriptor>>> {
        registry
            .resolve_visiting::<T>(visiting)
            .map(|driver| Some(driver.descriptor().clone()))
    }

    fn write_levels(&self, writer: &mut GraphWriter<'_>) -> Result<()> {
        self.base().write_levels(writer)?;
        self.write(writer)
    }

    fn read_levels(
        reader: &mut GraphReader<'_>,
        path: &[TypeLevel],
    ) -> Result<Self> {
        let Some((level, ancestors)) = path.split_last() else {
            return Err(Error::LayoutMismatch {
                type_name: T::TYPE_NAME.to_owned(),
                reason: "the stream records fewer ancestor levels than the \
                         local type has"
                    .to_owned(),
            });
        };

        if &*level.name != T::TYPE_NAME {
            return Err(Error::LayoutMismatch {
                type_name: T::TYPE_NAME.to_owned(),
                reason: format!(
                    "expected level `{}`, the stream records `{}`",
                    T::TYPE_NAME,
                    level.name
                ),
            });
        }

        if level.version > T::VERSION {
            return Err(Error::LayoutMismatch {
                type_name: T::TYPE_NAME.to_owned(),
                reason: format!(
                    "the stream records version {}, newer than the local \
                     version {}",
                    level.version,
                    T::VERSION
                ),
            });
        }

        let base = T::Base::read_levels(reader, ancestors)?;
        T::read(base, reader, level.version)
    }

    fn export_levels(&self, properties: &mut Properties) -> Result<()> {
        self.base().export_levels(properties)?;
        self.export(properties)
    }
}

/// A shared field: written once per stream, later occurrences become
/// back-references.
impl<T: Persist> Encode for Arc<T> {
    fn encode(&self, writer: &mut GraphWriter<'_>) -> Result<()> {
        writer.write_shared(self)
    }

    fn encode_option(
        value: Option<&Self>,
        writer: &mut GraphWriter<'_>,
    ) -> Result<()> {
        writer.write_nullable(value)
    }
}

impl<T: Persist> Decode for Arc<T> {
    fn decode(reader: &mut GraphReader<'_>) -> Result<Self> {
        reader.read_shared::<T>()
    }

    fn decode_option(reader: &mut GraphReader<'_>) -> Result<Option<Self>> {
        reader.read_nullable::<T>()
    }
}
