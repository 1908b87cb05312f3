//! Per-type drivers.
//!
//! A [`Driver`] bundles everything the codec knows about one runtime type:
//! its [`TypeDescriptor`] and up to three capabilities (serialize,
//! deserialize, export). Drivers are created by the [`Registry`] and shared
//! immutably for the lifetime of the registry.
//!
//! [`Registry`]: crate::Registry

use std::{
    any::{Any, TypeId, type_name},
    fmt,
    marker::PhantomData,
    sync::Arc,
};

use crate::{
    descriptor::TypeDescriptor,
    error::{Capability, Error, Result},
    export::Properties,
    reader::GraphReader,
    value::Object,
    writer::GraphWriter,
};

/// Writes an instance's data (everything after its type descriptor).
pub type SerializeFn =
    dyn Fn(&(dyn Any + Send + Sync), &mut GraphWriter<'_>) -> Result<()>
        + Send
        + Sync;

/// Reads an instance given the descriptor recorded in the stream.
pub type DeserializeFn =
    dyn Fn(&mut GraphReader<'_>, &TypeDescriptor) -> Result<Object>
        + Send
        + Sync;

/// Flattens an instance into properties.
pub type ExportFn =
    dyn Fn(&(dyn Any + Send + Sync), &mut Properties) -> Result<()>
        + Send
        + Sync;

/// How a driver came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverKind {
    /// The contentless object root.
    Root,

    /// A built-in primitive.
    Primitive,

    /// A self-describing type.
    TypeBased,

    /// A driver registered for a type that cannot describe itself.
    External,

    /// An enum over an integral representation.
    Enum,

    /// A list or dictionary composed from element drivers.
    Container,
}

/// The unit of per-type behavior.
pub struct Driver {
    type_id: TypeId,
    type_name: &'static str,
    kind: DriverKind,
    descriptor: Arc<TypeDescriptor>,
    components: Vec<Arc<Driver>>,
    serialize: Option<Box<SerializeFn>>,
    deserialize: Option<Box<DeserializeFn>>,
    export: Option<Box<ExportFn>>,
}

impl Driver {
    pub(crate) fn new<T: Any>(
        kind: DriverKind,
        descriptor: Arc<TypeDescriptor>,
    ) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            kind,
            descriptor,
            components: Vec::new(),
            serialize: None,
            deserialize: None,
            export: None,
        }
    }

    pub(crate) fn with_components(
        mut self,
        components: Vec<Arc<Self>>,
    ) -> Self {
        self.components = components;
        self
    }

    pub(crate) fn with_serialize(mut self, f: Box<SerializeFn>) -> Self {
        self.serialize = Some(f);
        self
    }

    pub(crate) fn with_deserialize(mut self, f: Box<DeserializeFn>) -> Self {
        self.deserialize = Some(f);
        self
    }

    pub(crate) fn with_export(mut self, f: Box<ExportFn>) -> Self {
        self.export = Some(f);
        self
    }

    /// The runtime type this driver handles.
    #[must_use]
    pub const fn runtime_type(&self) -> TypeId { self.type_id }

    /// The Rust type name, for diagnostics only.
    #[must_use]
    pub const fn type_name(&self) -> &'static str { self.type_name }

    /// How this driver was created.
    #[must_use]
    pub const fn kind(&self) -> DriverKind { self.kind }

    /// The descriptor written for instances of this type.
    #[must_use]
    pub const fn descriptor(&self) -> &Arc<TypeDescriptor> { &self.descriptor }

    /// The stable name recorded in streams.
    #[must_use]
    pub fn name(&self) -> &str { self.descriptor.name() }

    /// Drivers this one is composed of: the integral driver of an enum, the
    /// element drivers of a container.
    #[must_use]
    pub fn components(&self) -> &[Arc<Self>] { &self.components }

    /// Returns `true` if the driver supplies `capability`.
    #[must_use]
    pub const fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Serialize => self.serialize.is_some(),
            Capability::Deserialize => self.deserialize.is_some(),
            Capability::Export => self.export.is_some(),
        }
    }

    fn missing(&self, capability: Capability) -> Error {
        Error::MissingCapability {
            type_name: self.descriptor.name().to_owned(),
            capability,
        }
    }

    /// The serialize capability.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCapability`] if the driver cannot serialize.
    pub fn serializer(&self) -> Result<&SerializeFn> {
        self.serialize
            .as_deref()
            .ok_or_else(|| self.missing(Capability::Serialize))
    }

    /// The deserialize capability.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCapability`] if the driver cannot deserialize.
    pub fn deserializer(&self) -> Result<&DeserializeFn> {
        self.deserialize
            .as_deref()
            .ok_or_else(|| self.missing(Capability::Deserialize))
    }

    /// The export capability.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCapability`] if the driver cannot export.
    pub fn exporter(&self) -> Result<&ExportFn> {
        self.export.as_deref().ok_or_else(|| self.missing(Capability::Export))
    }
}

impl fmt::Debug for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("name", &self.descriptor.name())
            .field("type_name", &self.type_name)
            .field("kind", &self.kind)
            .field("serialize", &self.serialize.is_some())
            .field("deserialize", &self.deserialize.is_some())
            .field("export", &self.export.is_some())
            .finish_non_exhaustive()
    }
}

pub(crate) fn serialize_fn<F>(f: F) -> Box<SerializeFn>
where
    F: Fn(&(dyn Any + Send + Sync), &mut GraphWriter<'_>) -> Result<()>
        + Send
        + Sync
        + 'static,
{
    Box::new(f)
}

pub(crate) fn deserialize_fn<F>(f: F) -> Box<DeserializeFn>
where
    F: Fn(&mut GraphReader<'_>, &TypeDescriptor) -> Result<Object>
        + Send
        + Sync
        + 'static,
{
    Box::new(f)
}

pub(crate) fn export_fn<F>(f: F) -> Box<ExportFn>
where
    F: Fn(&(dyn Any + Send + Sync), &mut Properties) -> Result<()>
        + Send
        + Sync
        + 'static,
{
    Box::new(f)
}

pub(crate) fn downcast<T: Any>(value: &(dyn Any + Send + Sync)) -> Result<&T> {
    value.downcast_ref::<T>().ok_or_else(|| Error::TypeMismatch {
        expected: type_name::<T>().to_owned(),
        found: "object of another type".to_owned(),
    })
}

/// A driver for a type that cannot describe itself.
///
/// Any subset of the three capabilities may be supplied; requesting a
/// missing one fails with [`Error::MissingCapability`].
///
/// # Example
///
/// ```ignore
/// use skein_serialize::{Decoder, Encoder, ExternalDriver, Registry};
///
/// struct Meters(f64);
///
/// Registry::global().register_external(
///     ExternalDriver::<Meters>::new("geo.Meters")
///         .serialize(|m, writer| Ok(writer.emit_f64(m.0)?))
///         .deserialize(|reader| Ok(Meters(reader.read_f64()?))),
/// )?;
/// ```
pub struct ExternalDriver<T> {
    name: Arc<str>,
    serialize: Option<Box<SerializeFn>>,
    deserialize: Option<Box<DeserializeFn>>,
    export: Option<Box<ExportFn>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> ExternalDriver<T> {
    /// Starts a driver recorded in streams under `name`.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            serialize: None,
            deserialize: None,
            export: None,
            _marker: PhantomData,
        }
    }

    /// Supplies the serialize capability.
    #[must_use]
    pub fn serialize(
        mut self,
        f: impl Fn(&T, &mut GraphWriter<'_>) -> Result<()>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.serialize = Some(serialize_fn(move |value, writer| {
            f(downcast::<T>(value)?, writer)
        }));
        self
    }

    /// Supplies the deserialize capability.
    #[must_use]
    pub fn deserialize(
        mut self,
        f: impl Fn(&mut GraphReader<'_>) -> Result<T> + Send + Sync + 'static,
    ) -> Self {
        self.deserialize = Some(deserialize_fn(move |reader, _| {
            f(reader).map(|value| Arc::new(value) as Object)
        }));
        self
    }

    /// Supplies the export capability.
    #[must_use]
    pub fn export(
        mut self,
        f: impl Fn(&T, &mut Properties) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.export = Some(export_fn(move |value, properties| {
            f(downcast::<T>(value)?, properties)
        }));
        self
    }

    /// The stable name the driver will be registered under.
    #[must_use]
    pub fn name(&self) -> &str { &self.name }

    pub(crate) fn into_driver(self) -> Driver {
        let mut driver = Driver::new::<T>(
            DriverKind::External,
            Arc::new(TypeDescriptor::external(self.name)),
        );
        driver.serialize = self.serialize;
        driver.deserialize = self.deserialize;
        driver.export = self.export;
        driver
    }
}

impl<T> fmt::Debug for ExternalDriver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalDriver")
            .field("name", &self.name)
            .field("serialize", &self.serialize.is_some())
            .field("deserialize", &self.deserialize.is_some())
            .field("export", &self.export.is_some())
            .finish()
    }
}
