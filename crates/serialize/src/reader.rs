//! The graph reader.
//!
//! [`GraphReader`] reverses [`GraphWriter`](crate::GraphWriter). It keeps the
//! object table (stream index to instance) and the type resolver. An object's
//! slot is reserved before its data is read, so a back-reference to an
//! instance still under construction is observable as a pending slot.
//!
//! Pending references are resolved by deferred actions. They run once the
//! outermost read returns, in registration order: single-reference actions
//! first, then paired actions that need two table slots at once.

use std::{
    any::type_name,
    io::{self, Read},
    mem,
    panic::Location,
    sync::Arc,
};

use chrono::{DateTime, FixedOffset, TimeDelta, Utc};
use uuid::Uuid;

use crate::{
    containers::Element,
    decode::{Decode, Decoder},
    descriptor::{TypeDescriptor, TypeRef, TypeResolver},
    error::{Error, Result},
    marker::{Marker, TypeCode},
    options::Options,
    persist::{Level, Persist, Root},
    primitives::Primitive,
    registry::Registry,
    value::Value,
    wire::WireDecoder,
    writer::sentinel_tag,
};

#[cfg(test)]
mod test;

/// A value that may not be constructed yet.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched<T> {
    /// The value is available.
    Ready(T),

    /// The value sits at this object table index and is still under
    /// construction.
    Pending(usize),
}

impl<T> Fetched<T> {
    /// Maps a ready value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetched<U> {
        match self {
            Self::Ready(value) => Fetched::Ready(f(value)),
            Self::Pending(index) => Fetched::Pending(index),
        }
    }

    /// Returns the ready value, if any.
    pub fn ready(self) -> Option<T> {
        match self {
            Self::Ready(value) => Some(value),
            Self::Pending(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
enum Slot {
    Reserved,
    Ready(Value),
}

/// The instances of one stream, indexed in the order they were first
/// written.
#[derive(Debug, Default)]
pub struct ObjectTable {
    slots: Vec<Slot>,
}

impl ObjectTable {
    /// Number of assigned indices, including reserved ones.
    #[must_use]
    pub fn len(&self) -> usize { self.slots.len() }

    /// Returns `true` if no index was assigned yet.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.slots.is_empty() }

    fn reserve(&mut self) -> usize {
        self.slots.push(Slot::Reserved);
        self.slots.len() - 1
    }

    fn fill(&mut self, index: usize, value: Value) {
        self.slots[index] = Slot::Ready(value);
    }

    fn push(&mut self, value: Value) -> usize {
        self.slots.push(Slot::Ready(value));
        self.slots.len() - 1
    }

    fn is_reserved(&self, index: usize) -> bool {
        matches!(self.slots.get(index), Some(Slot::Reserved))
    }

    /// The instance at `index`, or [`Fetched::Pending`] while it is still
    /// under construction.
    #[must_use]
    pub fn fetch(&self, index: usize) -> Fetched<Value> {
        match self.slots.get(index) {
            Some(Slot::Ready(value)) => Fetched::Ready(value.clone()),
            _ => Fetched::Pending(index),
        }
    }

    /// The constructed instance at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnresolvedReference`] if the slot is empty.
    pub fn get(&self, index: usize) -> Result<Value> {
        match self.slots.get(index) {
            Some(Slot::Ready(value)) => Ok(value.clone()),
            _ => Err(Error::UnresolvedReference { index }),
        }
    }
}

struct Deferred {
    index: usize,
    action: Box<dyn FnOnce(Value) -> Result<()>>,
}

type DeferredPair = Box<dyn FnOnce(&ObjectTable) -> Result<()>>;

/// The header of a container: whether its elements share one type.
#[derive(Debug, Clone)]
pub(crate) enum ElementHeader {
    /// Every element has the declared type. Holds the element descriptor
    /// for described element types.
    Mono(Option<Arc<TypeDescriptor>>),

    /// Every element is a self-describing value.
    Poly,
}

/// Reads an object graph from a stream.
///
/// A reader is a single-threaded, single-stream session. It rebuilds shared
/// instances exactly once; every back-reference yields the same [`Arc`].
///
/// # Example
///
/// ```ignore
/// use skein_serialize::{GraphReader, Registry};
///
/// let mut stream = bytes.as_slice();
/// let mut reader = GraphReader::new(&mut stream, Registry::global());
/// let greeting = reader.read_value()?;
/// let answer = reader.read_value()?;
/// reader.finish()?;
/// ```
pub struct GraphReader<'r> {
    decoder: WireDecoder<&'r mut dyn Read>,
    registry: &'r Registry,
    options: Options,
    objects: ObjectTable,
    types: TypeResolver,
    deferred: Vec<Deferred>,
    deferred_pairs: Vec<DeferredPair>,
    depth: usize,
}

impl<'r> GraphReader<'r> {
    /// Creates a reader with default [`Options`].
    pub fn new(stream: &'r mut dyn Read, registry: &'r Registry) -> Self {
        Self::with_options(stream, registry, Options::default())
    }

    /// Creates a reader with explicit options. They must match the options
    /// the stream was written with.
    pub fn with_options(
        stream: &'r mut dyn Read,
        registry: &'r Registry,
        options: Options,
    ) -> Self {
        Self {
            decoder: WireDecoder::new(stream),
            registry,
            options,
            objects: ObjectTable::default(),
            types: TypeResolver::default(),
            deferred: Vec::new(),
            deferred_pairs: Vec::new(),
            depth: 0,
        }
    }

    /// The registry drivers are resolved from.
    #[must_use]
    pub const fn registry(&self) -> &'r Registry { self.registry }

    /// The session options.
    #[must_use]
    pub const fn options(&self) -> Options { self.options }

    /// Bytes consumed so far.
    #[must_use]
    pub const fn position(&self) -> u64 { self.decoder.position() }

    /// The instances read so far.
    #[must_use]
    pub const fn objects(&self) -> &ObjectTable { &self.objects }

    /// Reads any value.
    ///
    /// # Errors
    ///
    /// - [`Error::CyclicReference`] if the value is a back-reference to an
    ///   instance still under construction. Use
    ///   [`GraphReader::read_fetched`] where such references are expected.
    /// - [`Error::UnknownType`] if an object's type is not in the registry.
    /// - Any error of the stream or of the object's driver.
    pub fn read_value(&mut self) -> Result<Value> {
        match self.nested(Self::read_node)? {
            Fetched::Ready(value) => Ok(value),
            Fetched::Pending(index) => Err(self.pending_error(index)),
        }
    }

    /// Reads any value, reporting back-references to instances under
    /// construction as [`Fetched::Pending`] instead of failing.
    ///
    /// # Errors
    ///
    /// See [`GraphReader::read_value`].
    pub fn read_fetched(&mut self) -> Result<Fetched<Value>> {
        self.nested(Self::read_node)
    }

    /// Reads a non-null shared instance of a self-describing type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if the stream holds null or an
    /// instance of another type.
    pub fn read_shared<T: Persist>(&mut self) -> Result<Arc<T>> {
        self.read_nullable::<T>()?.ok_or_else(|| Error::TypeMismatch {
            expected: T::TYPE_NAME.to_owned(),
            found: "null".to_owned(),
        })
    }

    /// Reads an optional shared instance of a self-describing type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if the stream holds an instance of
    /// another type.
    pub fn read_nullable<T: Persist>(&mut self) -> Result<Option<Arc<T>>> {
        self.registry.resolve::<T>()?;

        match self.read_value()? {
            Value::Null => Ok(None),
            value => value.downcast::<T>().map(Some),
        }
    }

    /// Reads any [`Decode`] value.
    ///
    /// # Errors
    ///
    /// Propagates the value's decoding errors.
    pub fn read<T: Decode>(&mut self) -> Result<T> {
        self.nested(|reader| T::decode(reader))
    }

    /// Registers an action to run with the instance at `index` once the
    /// outermost read completes.
    pub fn defer(
        &mut self,
        index: usize,
        action: impl FnOnce(Value) -> Result<()> + 'static,
    ) {
        self.deferred.push(Deferred { index, action: Box::new(action) });
    }

    /// Registers an action that needs several table slots at once, such as
    /// a dictionary entry whose key and value are both pending. Paired
    /// actions run after every single-reference action.
    pub fn defer_pair(
        &mut self,
        action: impl FnOnce(&ObjectTable) -> Result<()> + 'static,
    ) {
        self.deferred_pairs.push(Box::new(action));
    }

    /// Checks for a debug sentinel carrying `tag` if sentinels are enabled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SentinelMismatch`] naming the caller if the stream
    /// holds anything else.
    #[track_caller]
    pub fn expect_sentinel(&mut self, tag: u32) -> Result<()> {
        let location = Location::caller();

        if !self.options.sentinels() {
            return Ok(());
        }

        let found = if self.read_u8()? == u8::from(Marker::Sentinel) {
            Some(self.read_u32()?)
        } else {
            None
        };

        if found == Some(tag) {
            Ok(())
        } else {
            Err(Error::SentinelMismatch { expected: tag, found, location })
        }
    }

    /// Ends the session, running any single or paired actions that are
    /// still deferred.
    ///
    /// Actions are normally run when the outermost read completes. They are
    /// left over when they were deferred outside of a read, or when a read
    /// failed midway.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnresolvedReference`] if a leftover action refers to
    /// a slot that was never filled, or the error of a failing action.
    pub fn finish(mut self) -> Result<()> {
        self.drain_deferred()?;

        tracing::trace!(
            objects = self.objects.len(),
            bytes = self.position(),
            "finished reading graph"
        );

        Ok(())
    }

    fn pending_error(&self, index: usize) -> Error {
        if self.objects.is_reserved(index) {
            Error::CyclicReference { index }
        } else {
            Error::UnresolvedReference { index }
        }
    }

    fn nested<R>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<R>,
    ) -> Result<R> {
        if self.depth >= self.options.max_depth() {
            return Err(Error::DepthExceeded {
                limit: self.options.max_depth(),
            });
        }

        self.depth += 1;
        let result = f(self);
        self.depth -= 1;

        let value = result?;
        if self.depth == 0 {
            self.drain_deferred()?;
        }
        Ok(value)
    }

    fn drain_deferred(&mut self) -> Result<()> {
        if self.deferred.is_empty() && self.deferred_pairs.is_empty() {
            return Ok(());
        }

        tracing::trace!(
            single = self.deferred.len(),
            paired = self.deferred_pairs.len(),
            "resolving deferred references"
        );

        for Deferred { index, action } in mem::take(&mut self.deferred) {
            action(self.objects.get(index)?)?;
        }

        for action in mem::take(&mut self.deferred_pairs) {
            action(&self.objects)?;
        }

        Ok(())
    }

    fn expect_next_index(&mut self) -> Result<usize> {
        let index = self.read_len()?;
        let expected = self.objects.len();

        if index == expected {
            Ok(index)
        } else {
            Err(Error::IndexMismatch { expected, found: index })
        }
    }

    fn read_reference(&mut self) -> Result<Fetched<Value>> {
        let index = self.read_len()?;

        if index >= self.objects.len() {
            return Err(Error::UnresolvedReference { index });
        }

        Ok(self.objects.fetch(index))
    }

    fn read_scalar<P: Primitive>(
        &mut self,
        wrap: impl FnOnce(P) -> Value,
    ) -> Result<Fetched<Value>> {
        P::read_flat(self).map(|value| Fetched::Ready(wrap(value)))
    }

    fn read_node(&mut self) -> Result<Fetched<Value>> {
        let byte = self.read_u8()?;

        match Marker::try_from(byte)? {
            Marker::Null => Ok(Fetched::Ready(Value::Null)),
            Marker::String => {
                let string: Arc<str> = Arc::from(self.read_string()?);
                let value = Value::String(string);
                self.objects.push(value.clone());
                Ok(Fetched::Ready(value))
            }
            Marker::Int32 => self.read_scalar::<i32>(Value::Int32),
            Marker::Double => self.read_scalar::<f64>(Value::Double),
            Marker::Char => self.read_scalar::<char>(Value::Char),
            Marker::UInt32 => self.read_scalar::<u32>(Value::UInt32),
            Marker::Float => self.read_scalar::<f32>(Value::Float),
            Marker::DateTime => {
                self.read_scalar::<DateTime<Utc>>(Value::DateTime)
            }
            Marker::Guid => self.read_scalar::<Uuid>(Value::Guid),
            Marker::TimeSpan => self.read_scalar::<TimeDelta>(Value::TimeSpan),
            Marker::DateTimeOffset => self
                .read_scalar::<DateTime<FixedOffset>>(Value::DateTimeOffset),
            Marker::Reference => self.read_reference(),
            Marker::EmptyObject => {
                self.expect_next_index()?;
                let value = Value::object(Root);
                self.objects.push(value.clone());
                Ok(Fetched::Ready(value))
            }
            Marker::Object => self.read_object().map(Fetched::Ready),
            Marker::Sentinel => Err(Error::InvalidMarker(byte)),
        }
    }

    fn read_object(&mut self) -> Result<Value> {
        self.expect_next_index()?;
        let index = self.objects.reserve();

        let descriptor = match self.read_type()? {
            TypeRef::Type(descriptor) => descriptor,
            TypeRef::Null | TypeRef::Root => {
                return Err(Error::invalid_data(format!(
                    "object #{index} has no concrete type"
                )));
            }
        };

        let driver =
            self.registry.get_by_name(descriptor.name()).ok_or_else(|| {
                Error::UnknownType { type_name: descriptor.name().to_owned() }
            })?;
        let deserialize = driver.deserializer()?;

        let value = Value::Object(deserialize(self, &*descriptor)?);
        self.expect_sentinel(sentinel_tag(index))?;
        self.objects.fill(index, value.clone());

        Ok(value)
    }

    /// Reads a type descriptor reference.
    pub(crate) fn read_type(&mut self) -> Result<TypeRef> {
        let code = self.read_u8()?;

        match TypeCode::try_from(code)? {
            TypeCode::Null => Ok(TypeRef::Null),
            TypeCode::Root => Ok(TypeRef::Root),
            TypeCode::Known => {
                let index = self.read_len()?;
                self.types.get(index).map(TypeRef::Type)
            }
            TypeCode::Simple => {
                let name: Arc<str> = Arc::from(self.read_string()?);
                let version =
                    u32::try_from(self.read_varint()?).map_err(|_| {
                        Error::invalid_data(format!(
                            "version of type `{name}` does not fit 32 bits"
                        ))
                    })?;

                let slot = self.types.reserve();
                let descriptor = match self.nested(Self::read_type)? {
                    TypeRef::Null => TypeDescriptor::external(name),
                    TypeRef::Root => {
                        TypeDescriptor::described(name, version, None)
                    }
                    TypeRef::Type(base) if base.is_described() => {
                        TypeDescriptor::described(name, version, Some(base))
                    }
                    TypeRef::Type(base) => {
                        return Err(Error::invalid_data(format!(
                            "type `{name}` derives from external type `{}`",
                            base.name()
                        )));
                    }
                };

                let descriptor = Arc::new(descriptor);
                self.types.fill(slot, descriptor.clone());
                Ok(TypeRef::Type(descriptor))
            }
        }
    }

    /// Reads the mono-type flag of a container and, for described element
    /// types, the element descriptor.
    pub(crate) fn read_element_header<E: Element>(
        &mut self,
    ) -> Result<ElementHeader> {
        if !self.read_bool()? {
            return Ok(ElementHeader::Poly);
        }

        if !E::SEALED {
            return Err(Error::LayoutMismatch {
                type_name: type_name::<E>().to_owned(),
                reason: "the stream declares a single element type for an \
                         open element type"
                    .to_owned(),
            });
        }

        if !E::DESCRIBED {
            return Ok(ElementHeader::Mono(None));
        }

        match self.read_type()? {
            TypeRef::Type(descriptor) => {
                Ok(ElementHeader::Mono(Some(descriptor)))
            }
            TypeRef::Null | TypeRef::Root => Err(Error::invalid_data(
                "a mono-typed container has no element type",
            )),
        }
    }

    /// Reads a shared element of a mono-typed container, whose descriptor
    /// was read once in the container header.
    pub(crate) fn read_shared_element<T: Persist>(
        &mut self,
        descriptor: &TypeDescriptor,
    ) -> Result<Fetched<Arc<T>>> {
        let byte = self.read_u8()?;

        match Marker::try_from(byte)? {
            Marker::Reference => match self.read_reference()? {
                Fetched::Ready(value) => {
                    value.downcast::<T>().map(Fetched::Ready)
                }
                Fetched::Pending(index) => Ok(Fetched::Pending(index)),
            },
            Marker::Object => {
                self.expect_next_index()?;
                let index = self.objects.reserve();

                let value = self.nested(|reader| {
                    T::read_levels(reader, descriptor.path())
                })?;
                self.expect_sentinel(sentinel_tag(index))?;

                let shared = Arc::new(value);
                self.objects.fill(index, Value::shared(&shared));
                Ok(Fetched::Ready(shared))
            }
            Marker::Null => Err(Error::TypeMismatch {
                expected: T::TYPE_NAME.to_owned(),
                found: "null".to_owned(),
            }),
            _ => Err(Error::InvalidMarker(byte)),
        }
    }
}

impl Decoder for GraphReader<'_> {
    fn read_u8(&mut self) -> io::Result<u8> { self.decoder.read_u8() }

    fn read_exact_into(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.decoder.read_exact_into(buf)
    }
}
