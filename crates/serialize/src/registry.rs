//! The process-wide (or injected) driver cache.
//!
//! The [`Registry`] maps runtime types and stable names to [`Driver`]s.
//! Drivers are synthesized lazily on first request:
//!
//! - [`resolve`](Registry::resolve) for self-describing [`Persist`] types,
//!   recursively resolving their ancestors;
//! - [`resolve_enum`](Registry::resolve_enum) for [`PersistEnum`] types,
//!   composing the driver of their integral representation;
//! - [`resolve_list`](Registry::resolve_list) and
//!   [`resolve_map`](Registry::resolve_map) for containers, composing the
//!   element drivers;
//! - [`register_external`](Registry::register_external) for types that
//!   cannot describe themselves.
//!
//! Creation never happens under a lock. Two threads racing to create the
//! same driver both build one, but only the first insertion is kept and the
//! loser's instance is dropped, so every caller observes a single driver per
//! type.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
    fmt,
    hash::Hash,
    sync::{Arc, LazyLock},
};

use dashmap::{DashMap, mapref::entry::Entry};
use fxhash::FxBuildHasher;

use crate::{
    containers::{Comparer, Element},
    decode::Decode,
    descriptor::TypeDescriptor,
    driver::{
        Driver, DriverKind, ExternalDriver, deserialize_fn, downcast,
        export_fn, serialize_fn,
    },
    encode::Encode,
    enumeration::{self, PersistEnum},
    error::{Error, Result},
    export::{Export, Properties},
    persist::{Level, Persist, Root},
    primitives,
    value::{self, Object, Value},
};


/// The driver cache consulted by every writer and reader.
///
/// A registry is safe to share between threads; writers and readers borrow
/// it for the duration of a session. Use [`Registry::global`] for a single
/// process-wide cache, or construct isolated registries with
/// [`Registry::new`].
pub struct Registry {
    by_type: DashMap<TypeId, Arc<Driver>, FxBuildHasher>,
    by_name: DashMap<Arc<str>, Arc<Driver>, FxBuildHasher>,
    root: Arc<Driver>,
}

impl Registry {
    /// Creates a registry holding the root and primitive drivers.
    #[must_use]
    pub fn new() -> Self {
        let root = Arc::new(root_driver());
        let registry = Self {
            by_type: DashMap::with_hasher(FxBuildHasher::default()),
            by_name: DashMap::with_hasher(FxBuildHasher::default()),
            root: root.clone(),
        };

        registry.insert_builtin(root.clone());
        for driver in primitives::builtin_drivers() {
            registry.insert_builtin(Arc::new(driver));
        }
        registry.insert_builtin(Arc::new(list_driver::<Value>(root)));

        registry
    }

    /// The lazily initialized process-wide registry.
    #[must_use]
    pub fn global() -> &'static Self {
        static GLOBAL: LazyLock<Registry> = LazyLock::new(Registry::new);
        &GLOBAL
    }

    fn insert_builtin(&self, driver: Arc<Driver>) {
        let name = driver.descriptor().name_arc().clone();
        self.by_name.insert(name, driver.clone());
        self.by_type.insert(driver.runtime_type(), driver);
    }

    /// The driver of the contentless root type.
    #[must_use]
    pub const fn root(&self) -> &Arc<Driver> { &self.root }

    /// Returns the driver for a runtime type, if one exists.
    #[must_use]
    pub fn get(&self, type_id: TypeId) -> Option<Arc<Driver>> {
        self.by_type.get(&type_id).map(|entry| entry.value().clone())
    }

    /// Returns the driver recorded in streams under `name`, if one exists.
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<Arc<Driver>> {
        self.by_name.get(name).map(|entry| entry.value().clone())
    }

    /// Returns the driver for `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingDriver`] if `T` has no driver yet.
    pub fn driver_of<T: Any>(&self) -> Result<Arc<Driver>> {
        self.get(TypeId::of::<T>()).ok_or_else(|| Error::MissingDriver {
            type_name: std::any::type_name::<T>().to_owned(),
        })
    }

    /// Returns the driver for the runtime type of `object`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingDriver`] if the type has no driver.
    pub fn driver_for(&self, object: &Object) -> Result<Arc<Driver>> {
        let type_id = Any::type_id(value::erased(object));
        self.get(type_id).ok_or_else(|| Error::MissingDriver {
            type_name: value::type_name_of(object).to_owned(),
        })
    }

    /// Number of installed drivers.
    #[must_use]
    pub fn len(&self) -> usize { self.by_type.len() }

    /// Always `false`: the root driver is installed on construction.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.by_type.is_empty() }

    fn install(&self, driver: Driver) -> Result<Arc<Driver>> {
        let driver = Arc::new(driver);

        match self.by_type.entry(driver.runtime_type()) {
            Entry::Occupied(entry) => return Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                entry.insert(driver.clone());
            }
        }

        let name = driver.descriptor().name_arc().clone();
        let conflict = match self.by_name.entry(name.clone()) {
            Entry::Occupied(entry) => (entry.get().runtime_type()
                != driver.runtime_type())
            .then(|| entry.get().type_name()),
            Entry::Vacant(entry) => {
                entry.insert(driver.clone());
                None
            }
        };

        if let Some(other) = conflict {
            self.by_type
                .remove_if(&driver.runtime_type(), |_, installed| {
                    Arc::ptr_eq(installed, &driver)
                });

            return Err(Error::AmbiguousDeclaration {
                type_name: name.to_string(),
                reason: format!(
                    "the name is already used by `{other}`, cannot use it \
                     for `{}`",
                    driver.type_name()
                ),
            });
        }

        tracing::debug!(
            name = driver.name(),
            kind = ?driver.kind(),
            "installed driver"
        );

        Ok(driver)
    }

    /// Returns the driver of a self-describing type, creating it (and the
    /// drivers of its ancestors) on first use.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidDeclaration`] if the stable name is empty or the
    ///   type is its own ancestor.
    /// - [`Error::AmbiguousDeclaration`] if the name is taken by another
    ///   type, or `T` already has an external driver.
    pub fn resolve<T: Persist>(&self) -> Result<Arc<Driver>> {
        self.resolve_visiting::<T>(&mut Vec::new())
    }

    pub(crate) fn resolve_visiting<T: Persist>(
        &self,
        visiting: &mut Vec<TypeId>,
    ) -> Result<Arc<Driver>> {
        let type_id = TypeId::of::<T>();

        if let Some(driver) = self.get(type_id) {
            if driver.kind() != DriverKind::TypeBased {
                return Err(Error::AmbiguousDeclaration {
                    type_name: T::TYPE_NAME.to_owned(),
                    reason: format!(
                        "the type describes itself but already has a {:?} \
                         driver named `{}`",
                        driver.kind(),
                        driver.name()
                    ),
                });
            }

            return Ok(driver);
        }

        if T::TYPE_NAME.is_empty() {
            return Err(Error::InvalidDeclaration {
                type_name: std::any::type_name::<T>().to_owned(),
                reason: "the stable type name is empty".to_owned(),
            });
        }

        if visiting.contains(&type_id) {
            return Err(Error::InvalidDeclaration {
                type_name: T::TYPE_NAME.to_owned(),
                reason: "the type is its own ancestor".to_owned(),
            });
        }

        visiting.push(type_id);
        let base = T::Base::level_descriptor(self, visiting);
        visiting.pop();

        let descriptor = Arc::new(TypeDescriptor::described(
            T::TYPE_NAME,
            T::VERSION,
            base?,
        ));

        let mut driver = Driver::new::<T>(DriverKind::TypeBased, descriptor)
            .with_serialize(serialize_fn(|value, writer| {
                downcast::<T>(value)?.write_levels(writer)
            }))
            .with_deserialize(deserialize_fn(|reader, ty| {
                let value = T::read_levels(reader, ty.path())?;
                Ok(Arc::new(value) as Object)
            }));

        if T::EXPORTS {
            driver = driver.with_export(export_fn(|value, properties| {
                downcast::<T>(value)?.export_levels(properties)
            }));
        }

        self.install(driver)
    }

    /// Returns the driver of an enum, composing the driver of its integral
    /// representation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AmbiguousDeclaration`] if the name is taken by
    /// another type.
    pub fn resolve_enum<T: PersistEnum>(&self) -> Result<Arc<Driver>> {
        if let Some(driver) = self.get(TypeId::of::<T>()) {
            return Ok(driver);
        }

        let repr = self.driver_of::<T::Repr>()?;
        let driver = Driver::new::<T>(
            DriverKind::Enum,
            Arc::new(TypeDescriptor::external(T::TYPE_NAME)),
        )
        .with_components(vec![repr])
        .with_serialize(serialize_fn(|value, writer| {
            enumeration::write_enum(downcast::<T>(value)?, writer)
        }))
        .with_deserialize(deserialize_fn(|reader, _| {
            Ok(Arc::new(enumeration::read_enum::<T>(reader)?) as Object)
        }))
        .with_export(export_fn(|value, properties| {
            let value = downcast::<T>(value)?;
            properties.insert("name", value.variant_name());
            properties.insert("value", value.to_repr().to_value());
            Ok(())
        }));

        self.install(driver)
    }

    /// Returns the driver of `Vec<E>`, so lists can be stored in a
    /// [`Value`].
    ///
    /// # Errors
    ///
    /// Propagates failures to resolve the element driver.
    pub fn resolve_list<E: Element + Export>(&self) -> Result<Arc<Driver>> {
        if let Some(driver) = self.get(TypeId::of::<Vec<E>>()) {
            return Ok(driver);
        }

        let element = E::element_driver(self)?;
        self.install(list_driver::<E>(element))
    }

    /// Returns the driver of `HashMap<K, V, S>`, so dictionaries can be
    /// stored in a [`Value`].
    ///
    /// The stable name only records the key and value types. Registering two
    /// maps that differ only in their comparer is ambiguous.
    ///
    /// # Errors
    ///
    /// Propagates failures to resolve the key or value driver.
    pub fn resolve_map<K, V, S>(&self) -> Result<Arc<Driver>>
    where
        K: Element + Eq + Hash,
        V: Element,
        S: Comparer + Send + Sync + 'static,
    {
        if let Some(driver) = self.get(TypeId::of::<HashMap<K, V, S>>()) {
            return Ok(driver);
        }

        let key = K::element_driver(self)?;
        let value = V::element_driver(self)?;
        let name = format!("dictionary<{},{}>", key.name(), value.name());

        let driver = Driver::new::<HashMap<K, V, S>>(
            DriverKind::Container,
            Arc::new(TypeDescriptor::external(name)),
        )
        .with_components(vec![key, value])
        .with_serialize(serialize_fn(|value, writer| {
            downcast::<HashMap<K, V, S>>(value)?.encode(writer)
        }))
        .with_deserialize(deserialize_fn(|reader, _| {
            Ok(Arc::new(HashMap::<K, V, S>::decode(reader)?) as Object)
        }));

        self.install(driver)
    }

    /// Installs a driver for a type that cannot describe itself.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AmbiguousDeclaration`] if `T` already has a driver
    /// or the name is taken.
    pub fn register_external<T: Any + Send + Sync>(
        &self,
        driver: ExternalDriver<T>,
    ) -> Result<Arc<Driver>> {
        if let Some(existing) = self.get(TypeId::of::<T>()) {
            return Err(Error::AmbiguousDeclaration {
                type_name: driver.name().to_owned(),
                reason: format!(
                    "`{}` already has a {:?} driver named `{}`",
                    existing.type_name(),
                    existing.kind(),
                    existing.name()
                ),
            });
        }

        if driver.name().is_empty() {
            return Err(Error::InvalidDeclaration {
                type_name: std::any::type_name::<T>().to_owned(),
                reason: "the stable type name is empty".to_owned(),
            });
        }

        self.install(driver.into_driver())
    }

    /// Flattens an instance into properties using its driver's export
    /// capability.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingDriver`] or [`Error::MissingCapability`] if
    /// the instance cannot be exported.
    pub fn export(&self, object: &Object) -> Result<Properties> {
        let driver = self.driver_for(object)?;
        let mut properties = Properties::new();
        driver.exporter()?(value::erased(object), &mut properties)?;
        Ok(properties)
    }
}

impl Default for Registry {
    fn default() -> Self { Self::new() }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry").field("drivers", &self.len()).finish()
    }
}

fn root_driver() -> Driver {
    Driver::new::<Root>(
        DriverKind::Root,
        Arc::new(TypeDescriptor::external(Root::TYPE_NAME)),
    )
    .with_serialize(serialize_fn(|_, _| Ok(())))
    .with_deserialize(deserialize_fn(|_, _| Ok(Arc::new(Root) as Object)))
    .with_export(export_fn(|_, _| Ok(())))
}

fn list_driver<E: Element + Export>(element: Arc<Driver>) -> Driver {
    let name = format!("list<{}>", element.name());

    Driver::new::<Vec<E>>(
        DriverKind::Container,
        Arc::new(TypeDescriptor::external(name)),
    )
    .with_components(vec![element])
    .with_serialize(serialize_fn(|value, writer| {
        downcast::<Vec<E>>(value)?.encode(writer)
    }))
    .with_deserialize(deserialize_fn(|reader, _| {
        Ok(Arc::new(Vec::<E>::decode(reader)?) as Object)
    }))
    .with_export(export_fn(|value, properties| {
        for (index, element) in downcast::<Vec<E>>(value)?.iter().enumerate() {
            properties.insert(index.to_string(), element.to_value());
        }
        Ok(())
    }))
}
