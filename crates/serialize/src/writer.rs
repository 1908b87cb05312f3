//! The graph writer.
//!
//! [`GraphWriter`] turns a graph of [`Value`]s into a stream. It owns the
//! two per-stream tables: the reference table (object identity to index, in
//! first-seen order) and the type interner. Both only ever grow; a stream
//! is one coherent snapshot.

use std::{
    any::{Any, TypeId},
    io::{self, Write},
    sync::Arc,
};

use fxhash::{FxHashMap, FxHashSet};

use crate::{
    containers::Element,
    descriptor::{TypeDescriptor, TypeInterner},
    encode::{Encode, Encoder},
    error::{Error, Result},
    marker::{Marker, TypeCode},
    options::Options,
    persist::{Level, Persist, Root},
    primitives::Primitive,
    registry::Registry,
    value::{self, Object, Value},
    wire::WireEncoder,
};

/// Maps shared instances to their stream index.
///
/// Instances are retained until the writer is dropped so an address cannot
/// be reused by a new allocation while the stream is being written.
#[derive(Debug, Default)]
struct ReferenceTable {
    indices: FxHashMap<usize, usize>,
    retained: Vec<Value>,
}

impl ReferenceTable {
    fn get(&self, identity: usize) -> Option<usize> {
        self.indices.get(&identity).copied()
    }

    fn insert(&mut self, identity: usize, value: Value) -> usize {
        let index = self.retained.len();
        self.indices.insert(identity, index);
        self.retained.push(value);
        index
    }
}

pub(crate) fn sentinel_tag(index: usize) -> u32 {
    u32::try_from(index).unwrap_or(u32::MAX)
}

/// Writes an object graph into a stream.
///
/// A writer is a single-threaded, single-stream session. Shared instances
/// are written once; later occurrences become back-references. An
/// instance's index is assigned before its fields are written, so a graph
/// may refer back to an instance that is still being written. Such a
/// back-reference is only accepted where a reader can defer it: through a
/// [`Link`](crate::Link) or a [`SharedMap`](crate::SharedMap) entry.
///
/// # Example
///
/// ```ignore
/// use skein_serialize::{GraphWriter, Registry, Value};
///
/// let mut bytes = Vec::new();
/// let mut writer = GraphWriter::new(&mut bytes, Registry::global());
/// writer.write_value(&Value::from("hello"))?;
/// writer.write_value(&Value::Int32(42))?;
/// writer.finish()?;
/// ```
pub struct GraphWriter<'w> {
    encoder: WireEncoder<&'w mut dyn Write>,
    registry: &'w Registry,
    options: Options,
    references: ReferenceTable,
    types: TypeInterner,
    open: FxHashSet<usize>,
    deferrable: bool,
    depth: usize,
}

impl<'w> GraphWriter<'w> {
    /// Creates a writer with default [`Options`].
    pub fn new(stream: &'w mut dyn Write, registry: &'w Registry) -> Self {
        Self::with_options(stream, registry, Options::default())
    }

    /// Creates a writer with explicit options.
    pub fn with_options(
        stream: &'w mut dyn Write,
        registry: &'w Registry,
        options: Options,
    ) -> Self {
        Self {
            encoder: WireEncoder::new(stream),
            registry,
            options,
            references: ReferenceTable::default(),
            types: TypeInterner::default(),
            open: FxHashSet::default(),
            deferrable: false,
            depth: 0,
        }
    }

    /// The registry drivers are resolved from.
    #[must_use]
    pub const fn registry(&self) -> &'w Registry { self.registry }

    /// The session options.
    #[must_use]
    pub const fn options(&self) -> Options { self.options }

    /// Bytes written so far.
    #[must_use]
    pub const fn position(&self) -> u64 { self.encoder.position() }

    /// Number of shared instances assigned an index so far.
    #[must_use]
    pub fn object_count(&self) -> usize { self.references.retained.len() }

    /// Number of type descriptors interned so far.
    #[must_use]
    pub fn type_count(&self) -> usize { self.types.len() }

    /// Writes any value: null, an inlined scalar, a shared string, or an
    /// object.
    ///
    /// # Errors
    ///
    /// Returns an error if an object's type has no driver or no serialize
    /// capability, or if the stream fails.
    pub fn write_value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => self.emit_marker(Marker::Null),
            Value::String(string) => self.write_string(string),
            Value::Int32(v) => self.write_scalar(Marker::Int32, v),
            Value::Double(v) => self.write_scalar(Marker::Double, v),
            Value::Char(v) => self.write_scalar(Marker::Char, v),
            Value::UInt32(v) => self.write_scalar(Marker::UInt32, v),
            Value::Float(v) => self.write_scalar(Marker::Float, v),
            Value::DateTime(v) => self.write_scalar(Marker::DateTime, v),
            Value::Guid(v) => self.write_scalar(Marker::Guid, v),
            Value::TimeSpan(v) => self.write_scalar(Marker::TimeSpan, v),
            Value::DateTimeOffset(v) => {
                self.write_scalar(Marker::DateTimeOffset, v)
            }
            Value::Object(object) => self.write_object(object),
        }
    }

    fn emit_marker(&mut self, marker: Marker) -> Result<()> {
        Ok(self.emit_u8(marker.into())?)
    }

    fn write_scalar<P: Primitive>(
        &mut self,
        marker: Marker,
        value: &P,
    ) -> Result<()> {
        self.emit_marker(marker)?;
        value.write_flat(self)
    }

    fn emit_reference(&mut self, index: usize) -> Result<()> {
        self.emit_marker(Marker::Reference)?;
        Ok(self.emit_len(index)?)
    }

    /// Writes a shared string, or a back-reference if this very string was
    /// written before.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream fails.
    pub fn write_string(&mut self, string: &Arc<str>) -> Result<()> {
        let identity = Arc::as_ptr(string).cast::<u8>() as usize;

        if let Some(index) = self.references.get(identity) {
            return self.emit_reference(index);
        }

        self.references.insert(identity, Value::String(string.clone()));
        self.emit_marker(Marker::String)?;
        Ok(self.emit_str(string)?)
    }

    /// Writes a shared instance of any registered type.
    ///
    /// The bare [`Root`] instance becomes an `EmptyObject`; any other
    /// instance is written as an `Object` with its type descriptor and the
    /// data its driver produces.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingDriver`] or [`Error::MissingCapability`] if the
    ///   instance's type cannot be serialized.
    /// - [`Error::CyclicReference`] if the instance is still being written
    ///   and this position cannot be resolved later.
    pub fn write_object(&mut self, object: &Object) -> Result<()> {
        let identity = value::identity(object);

        if let Some(index) = self.references.get(identity) {
            return self.write_back_reference(identity, index);
        }

        if Any::type_id(value::erased(object)) == TypeId::of::<Root>() {
            let index =
                self.references.insert(identity, Value::Object(object.clone()));
            self.emit_marker(Marker::EmptyObject)?;
            return Ok(self.emit_len(index)?);
        }

        let driver = self.registry.driver_for(object)?;
        let serialize = driver.serializer()?;

        let index =
            self.references.insert(identity, Value::Object(object.clone()));
        self.emit_marker(Marker::Object)?;
        self.emit_len(index)?;
        self.write_type(driver.descriptor())?;

        self.write_body(identity, |writer| {
            serialize(value::erased(object), writer)
        })?;
        self.sentinel(sentinel_tag(index))
    }

    /// Writes a shared instance of a self-describing type, resolving its
    /// driver first.
    ///
    /// # Errors
    ///
    /// See [`GraphWriter::write_object`] and [`Registry::resolve`].
    pub fn write_shared<T: Persist>(&mut self, value: &Arc<T>) -> Result<()> {
        self.registry.resolve::<T>()?;
        let object: Object = value.clone();
        self.write_object(&object)
    }

    /// Writes an optional shared instance; `None` becomes the null marker.
    ///
    /// # Errors
    ///
    /// See [`GraphWriter::write_shared`].
    pub fn write_nullable<T: Persist>(
        &mut self,
        value: Option<&Arc<T>>,
    ) -> Result<()> {
        match value {
            Some(value) => self.write_shared(value),
            None => self.emit_marker(Marker::Null),
        }
    }

    /// Writes any [`Encode`] value inline.
    ///
    /// # Errors
    ///
    /// Propagates the value's encoding errors.
    pub fn write<T: Encode + ?Sized>(&mut self, value: &T) -> Result<()> {
        value.encode(self)
    }

    /// Writes a debug sentinel carrying `tag` if sentinels are enabled.
    ///
    /// The paired [`GraphReader::expect_sentinel`] must be called at the
    /// same position with the same tag.
    ///
    /// [`GraphReader::expect_sentinel`]: crate::GraphReader::expect_sentinel
    ///
    /// # Errors
    ///
    /// Returns an error if the stream fails.
    pub fn sentinel(&mut self, tag: u32) -> Result<()> {
        if self.options.sentinels() {
            self.emit_marker(Marker::Sentinel)?;
            self.emit_u32(tag)?;
        }

        Ok(())
    }

    /// Flushes the stream and ends the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream fails to flush.
    pub fn finish(mut self) -> Result<()> {
        self.encoder.flush()?;

        tracing::trace!(
            objects = self.object_count(),
            types = self.type_count(),
            bytes = self.position(),
            "finished writing graph"
        );

        Ok(())
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
        result
    }

    /// Writes the fields of the instance at `identity`. Until they are
    /// written, a back-reference to it is only accepted where it can be
    /// deferred.
    fn write_body(
        &mut self,
        identity: usize,
        f: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<()> {
        let deferrable = std::mem::replace(&mut self.deferrable, false);
        self.open.insert(identity);

        let result = self.nested(f);

        self.open.remove(&identity);
        self.deferrable = deferrable;
        result
    }

    fn write_back_reference(
        &mut self,
        identity: usize,
        index: usize,
    ) -> Result<()> {
        if !self.deferrable && self.open.contains(&identity) {
            return Err(Error::CyclicReference { index });
        }

        self.emit_reference(index)
    }

    /// Runs `f` in a position whose references the reader may resolve
    /// after the enclosing object is complete.
    pub(crate) fn write_deferrable<R>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<R>,
    ) -> Result<R> {
        let deferrable = std::mem::replace(&mut self.deferrable, true);
        let result = f(self);
        self.deferrable = deferrable;
        result
    }

    /// Writes a type descriptor reference, interning every level not seen
    /// before in this stream.
    pub(crate) fn write_type(
        &mut self,
        descriptor: &Arc<TypeDescriptor>,
    ) -> Result<()> {
        let mut current = descriptor;

        loop {
            if let Some(index) = self.types.get(current.name()) {
                self.emit_u8(TypeCode::Known.into())?;
                return Ok(self.emit_len(index)?);
            }

            self.types.intern(current.name_arc());
            self.emit_u8(TypeCode::Simple.into())?;
            self.emit_str(current.name())?;
            self.emit_varint(u64::from(current.version().unwrap_or(0)))?;

            match (current.version(), current.base()) {
                (None, _) => return Ok(self.emit_u8(TypeCode::Null.into())?),
                (Some(_), None) => {
                    return Ok(self.emit_u8(TypeCode::Root.into())?);
                }
                (Some(_), Some(base)) => current = base,
            }
        }
    }

    /// Writes the mono-type flag of a container and, for described
    /// element types, the element descriptor.
    pub(crate) fn write_element_header<E: Element>(&mut self) -> Result<()> {
        self.emit_bool(E::SEALED)?;

        if E::SEALED && E::DESCRIBED {
            let driver = E::element_driver(self.registry)?;
            self.write_type(driver.descriptor())?;
        }

        Ok(())
    }

    /// Writes a shared element of a mono-typed container: the descriptor
    /// was written once in the container header and is omitted here.
    pub(crate) fn write_shared_element<T: Persist>(
        &mut self,
        value: &Arc<T>,
    ) -> Result<()> {
        let object: Object = value.clone();
        let identity = value::identity(&object);

        if let Some(index) = self.references.get(identity) {
            return self.write_back_reference(identity, index);
        }

        let index = self.references.insert(identity, Value::Object(object));
        self.emit_marker(Marker::Object)?;
        self.emit_len(index)?;

        self.write_body(identity, |writer| value.write_levels(writer))?;
        self.sentinel(sentinel_tag(index))
    }
}

impl Encoder for GraphWriter<'_> {
    fn emit_u8(&mut self, v: u8) -> io::Result<()> { self.encoder.emit_u8(v) }

    fn emit_raw_bytes(&mut self, s: &[u8]) -> io::Result<()> {
        self.encoder.emit_raw_bytes(s)
    }
}
