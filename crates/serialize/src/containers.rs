//! Lists and dictionaries.
//!
//! A container is written as a signed 32-bit count (`-1` for a null
//! container), then one element header per element type, then the
//! elements:
//!
//! ```text
//! List       := Int32(count) ElementHeader Element*
//! Dictionary := Int32(count) Comparer ElementHeader(key)
//!               ElementHeader(value) (Key Value)*
//! ElementHeader := Bool(mono) [TypeDescRef]   ; descriptor only for
//!                                             ; described element types
//! ```
//!
//! When the element type is sealed (every element has exactly the declared
//! type) the header sets the mono flag and elements are written without
//! their own descriptors. Otherwise every element is a full self-describing
//! value.

use std::{
    collections::{BTreeMap, HashMap},
    hash::{BuildHasher, BuildHasherDefault, Hash, Hasher, RandomState},
    sync::Arc,
};

use crate::{
    decode::{Decode, Decoder},
    descriptor::TypeDescriptor,
    driver::Driver,
    encode::{Encode, Encoder},
    error::{Error, Result},
    persist::Persist,
    reader::{ElementHeader, Fetched, GraphReader, ObjectTable},
    registry::Registry,
    value::Value,
    writer::GraphWriter,
};

/// The largest capacity reserved up front from a count read from a stream.
pub(crate) const PREALLOCATE_LIMIT: usize = 4096;

/// A type that can be an element of a list or a key or value of a
/// dictionary.
///
/// Implemented for primitives, `Arc<T>` of self-describing types,
/// [`PersistEnum`](crate::PersistEnum) types and [`Value`].
pub trait Element: Sized + Send + Sync + 'static {
    /// Whether every instance has exactly this type, so a container can
    /// declare the element type once.
    const SEALED: bool = true;

    /// Whether the element type is self-describing, so a mono-typed
    /// container records its descriptor in the header.
    const DESCRIBED: bool = false;

    /// The driver of the element type.
    ///
    /// # Errors
    ///
    /// Propagates failures to resolve the driver.
    fn element_driver(registry: &Registry) -> Result<Arc<Driver>>;

    /// Writes one element of a mono-typed container.
    ///
    /// # Errors
    ///
    /// Propagates the element's encoding errors.
    fn write_element(&self, writer: &mut GraphWriter<'_>) -> Result<()>;

    /// Reads one element of a mono-typed container.
    ///
    /// # Errors
    ///
    /// Propagates the element's decoding errors.
    fn read_element(
        reader: &mut GraphReader<'_>,
        descriptor: Option<&Arc<TypeDescriptor>>,
    ) -> Result<Fetched<Self>>;

    /// Converts a self-describing value read from a poly-typed container.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if the value has another type.
    fn from_value(value: Value) -> Result<Self>;
}

impl<T: Persist> Element for Arc<T> {
    const DESCRIBED: bool = true;

    fn element_driver(registry: &Registry) -> Result<Arc<Driver>> {
        registry.resolve::<T>()
    }

    fn write_element(&self, writer: &mut GraphWriter<'_>) -> Result<()> {
        writer.write_shared_element(self)
    }

    fn read_element(
        reader: &mut GraphReader<'_>,
        descriptor: Option<&Arc<TypeDescriptor>>,
    ) -> Result<Fetched<Self>> {
        let descriptor = descriptor.ok_or_else(|| {
            Error::invalid_data(format!(
                "elements of `{}` were written without a type",
                T::TYPE_NAME
            ))
        })?;

        reader.read_shared_element::<T>(descriptor)
    }

    fn from_value(value: Value) -> Result<Self> { value.downcast::<T>() }
}

impl Element for Value {
    const SEALED: bool = false;

    fn element_driver(registry: &Registry) -> Result<Arc<Driver>> {
        Ok(registry.root().clone())
    }

    fn write_element(&self, writer: &mut GraphWriter<'_>) -> Result<()> {
        writer.write_value(self)
    }

    fn read_element(
        reader: &mut GraphReader<'_>,
        _: Option<&Arc<TypeDescriptor>>,
    ) -> Result<Fetched<Self>> {
        reader.read_fetched()
    }

    fn from_value(value: Value) -> Result<Self> { Ok(value) }
}

impl<E: Element> Fetched<E> {
    /// Returns the element, looking a pending one up in `objects`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnresolvedReference`] if the slot is still empty, or
    /// [`Error::TypeMismatch`] if it holds another type.
    pub fn resolve(self, objects: &ObjectTable) -> Result<E> {
        match self {
            Self::Ready(element) => Ok(element),
            Self::Pending(index) => E::from_value(objects.get(index)?),
        }
    }
}

fn write_count(writer: &mut GraphWriter<'_>, len: usize) -> Result<()> {
    let count = i32::try_from(len).map_err(|_| {
        Error::invalid_data(format!("container of {len} elements is too large"))
    })?;

    Ok(writer.emit_i32(count)?)
}

pub(crate) fn write_null_count(writer: &mut GraphWriter<'_>) -> Result<()> {
    Ok(writer.emit_i32(-1)?)
}

pub(crate) fn read_count(
    reader: &mut GraphReader<'_>,
) -> Result<Option<usize>> {
    match reader.read_i32()? {
        -1 => Ok(None),
        count => usize::try_from(count).map(Some).map_err(|_| {
            Error::invalid_data(format!("invalid container count {count}"))
        }),
    }
}

pub(crate) fn require_count(reader: &mut GraphReader<'_>) -> Result<usize> {
    read_count(reader)?.ok_or_else(|| {
        Error::invalid_data("a null container where a container is required")
    })
}

/// Reads one element according to the container header.
pub(crate) fn read_item<E: Element>(
    reader: &mut GraphReader<'_>,
    header: &ElementHeader,
) -> Result<Fetched<E>> {
    match header {
        ElementHeader::Mono(descriptor) => {
            E::read_element(reader, descriptor.as_ref())
        }
        ElementHeader::Poly => match reader.read_fetched()? {
            Fetched::Ready(value) => E::from_value(value).map(Fetched::Ready),
            Fetched::Pending(index) => Ok(Fetched::Pending(index)),
        },
    }
}

/// Reads one element that must be available right away.
fn read_ready<E: Element>(
    reader: &mut GraphReader<'_>,
    header: &ElementHeader,
) -> Result<E> {
    match read_item::<E>(reader, header)? {
        Fetched::Ready(element) => Ok(element),
        Fetched::Pending(index) => Err(Error::CyclicReference { index }),
    }
}

// =============================================================================
// Lists
// =============================================================================

impl<E: Element> Encode for Vec<E> {
    fn encode(&self, writer: &mut GraphWriter<'_>) -> Result<()> {
        write_count(writer, self.len())?;
        writer.write_element_header::<E>()?;

        for element in self {
            element.write_element(writer)?;
        }

        Ok(())
    }

    fn encode_option(
        value: Option<&Self>,
        writer: &mut GraphWriter<'_>,
    ) -> Result<()> {
        match value {
            Some(value) => value.encode(writer),
            None => write_null_count(writer),
        }
    }
}

fn read_list<E: Element>(
    reader: &mut GraphReader<'_>,
    len: usize,
) -> Result<Vec<E>> {
    let header = reader.read_element_header::<E>()?;
    let mut list = Vec::with_capacity(len.min(PREALLOCATE_LIMIT));

    for _ in 0..len {
        list.push(read_ready::<E>(reader, &header)?);
    }

    Ok(list)
}

impl<E: Element> Decode for Vec<E> {
    fn decode(reader: &mut GraphReader<'_>) -> Result<Self> {
        let len = require_count(reader)?;
        read_list(reader, len)
    }

    fn decode_option(reader: &mut GraphReader<'_>) -> Result<Option<Self>> {
        match read_count(reader)? {
            Some(len) => read_list(reader, len).map(Some),
            None => Ok(None),
        }
    }
}

// =============================================================================
// Dictionaries
// =============================================================================

/// The hashing strategy of a dictionary, recorded in the stream in the
/// comparer slot.
///
/// The default strategies are written as null. A custom strategy writes any
/// value that lets [`Comparer::read_comparer`] rebuild it.
pub trait Comparer: BuildHasher + Sized {
    /// Writes the comparer slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream fails.
    fn write_comparer(&self, writer: &mut GraphWriter<'_>) -> Result<()> {
        writer.write_value(&Value::Null)
    }

    /// Rebuilds the comparer from its slot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if the slot holds a comparer this
    /// type cannot rebuild.
    fn read_comparer(reader: &mut GraphReader<'_>) -> Result<Self>;
}

fn expect_default_comparer(reader: &mut GraphReader<'_>) -> Result<()> {
    match reader.read_value()? {
        Value::Null => Ok(()),
        other => Err(Error::TypeMismatch {
            expected: "the default comparer".to_owned(),
            found: other.kind().to_owned(),
        }),
    }
}

impl Comparer for RandomState {
    fn read_comparer(reader: &mut GraphReader<'_>) -> Result<Self> {
        expect_default_comparer(reader)?;
        Ok(Self::new())
    }
}

impl<H: Hasher + Default> Comparer for BuildHasherDefault<H> {
    fn read_comparer(reader: &mut GraphReader<'_>) -> Result<Self> {
        expect_default_comparer(reader)?;
        Ok(Self::default())
    }
}

fn write_entries<'a, K, V>(
    writer: &mut GraphWriter<'_>,
    entries: impl Iterator<Item = (&'a K, &'a V)>,
) -> Result<()>
where
    K: Element,
    V: Element,
{
    writer.write_element_header::<K>()?;
    writer.write_element_header::<V>()?;

    for (key, value) in entries {
        key.write_element(writer)?;
        value.write_element(writer)?;
    }

    Ok(())
}

fn read_entries<K: Element, V: Element>(
    reader: &mut GraphReader<'_>,
    len: usize,
    mut insert: impl FnMut(K, V) -> bool,
) -> Result<()> {
    let key_header = reader.read_element_header::<K>()?;
    let value_header = reader.read_element_header::<V>()?;

    for _ in 0..len {
        let key = read_ready::<K>(reader, &key_header)?;
        let value = read_ready::<V>(reader, &value_header)?;

        if !insert(key, value) {
            return Err(Error::invalid_data("duplicate dictionary key"));
        }
    }

    Ok(())
}

impl<K, V, S> Encode for HashMap<K, V, S>
where
    K: Element + Eq + Hash,
    V: Element,
    S: Comparer,
{
    fn encode(&self, writer: &mut GraphWriter<'_>) -> Result<()> {
        write_count(writer, self.len())?;
        self.hasher().write_comparer(writer)?;
        write_entries(writer, self.iter())
    }

    fn encode_option(
        value: Option<&Self>,
        writer: &mut GraphWriter<'_>,
    ) -> Result<()> {
        match value {
            Some(value) => value.encode(writer),
            None => write_null_count(writer),
        }
    }
}

fn read_hash_map<K, V, S>(
    reader: &mut GraphReader<'_>,
    len: usize,
) -> Result<HashMap<K, V, S>>
where
    K: Element + Eq + Hash,
    V: Element,
    S: Comparer,
{
    let hasher = S::read_comparer(reader)?;
    let mut map =
        HashMap::with_capacity_and_hasher(len.min(PREALLOCATE_LIMIT), hasher);

    read_entries(reader, len, |key, value| map.insert(key, value).is_none())?;
    Ok(map)
}

impl<K, V, S> Decode for HashMap<K, V, S>
where
    K: Element + Eq + Hash,
    V: Element,
    S: Comparer,
{
    fn decode(reader: &mut GraphReader<'_>) -> Result<Self> {
        let len = require_count(reader)?;
        read_hash_map(reader, len)
    }

    fn decode_option(reader: &mut GraphReader<'_>) -> Result<Option<Self>> {
        match read_count(reader)? {
            Some(len) => read_hash_map(reader, len).map(Some),
            None => Ok(None),
        }
    }
}

/// Ordered dictionaries use the key's [`Ord`] and always write the default
/// comparer.
impl<K: Element + Ord, V: Element> Encode for BTreeMap<K, V> {
    fn encode(&self, writer: &mut GraphWriter<'_>) -> Result<()> {
        write_count(writer, self.len())?;
        writer.write_value(&Value::Null)?;
        write_entries(writer, self.iter())
    }

    fn encode_option(
        value: Option<&Self>,
        writer: &mut GraphWriter<'_>,
    ) -> Result<()> {
        match value {
            Some(value) => value.encode(writer),
            None => write_null_count(writer),
        }
    }
}

fn read_btree_map<K: Element + Ord, V: Element>(
    reader: &mut GraphReader<'_>,
    len: usize,
) -> Result<BTreeMap<K, V>> {
    expect_default_comparer(reader)?;

    let mut map = BTreeMap::new();
    read_entries(reader, len, |key, value| map.insert(key, value).is_none())?;
    Ok(map)
}

impl<K: Element + Ord, V: Element> Decode for BTreeMap<K, V> {
    fn decode(reader: &mut GraphReader<'_>) -> Result<Self> {
        let len = require_count(reader)?;
        read_btree_map(reader, len)
    }

    fn decode_option(reader: &mut GraphReader<'_>) -> Result<Option<Self>> {
        match read_count(reader)? {
            Some(len) => read_btree_map(reader, len).map(Some),
            None => Ok(None),
        }
    }
}
