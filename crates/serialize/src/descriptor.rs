//! Type descriptors and their per-stream interning tables.
//!
//! A [`TypeDescriptor`] names a serializable type, its on-disk version and
//! its nearest serializable ancestor. Within one stream each descriptor is
//! written in full once; later occurrences replay its index.
//!
//! ```text
//! TypeDescRef := 0x00                                   ; null type
//!              | 0x01                                   ; object root
//!              | 0x02 Name VarInt(version) TypeDescRef  ; new type + base
//!              | 0x03 VarInt(index)                     ; already seen
//! ```

use std::sync::{Arc, OnceLock};

use fxhash::FxHashMap;

use crate::error::{Error, Result};

/// One level of a [`TypeDescriptor`] chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeLevel {
    /// The stable name of the type at this level.
    pub name: Arc<str>,

    /// The on-disk version recorded for this level.
    pub version: u32,
}

/// Identifies a serializable type and its ancestor chain.
///
/// Self-describing types carry a version and optionally a base. External
/// types (primitives, registered drivers, containers) carry neither and
/// have an empty [`path`](TypeDescriptor::path).
#[derive(Debug)]
pub struct TypeDescriptor {
    name: Arc<str>,
    version: Option<u32>,
    base: Option<Arc<TypeDescriptor>>,
    path: OnceLock<Box<[TypeLevel]>>,
}

impl TypeDescriptor {
    /// Creates the descriptor of a self-describing type.
    #[must_use]
    pub fn described(
        name: impl Into<Arc<str>>,
        version: u32,
        base: Option<Arc<Self>>,
    ) -> Self {
        Self {
            name: name.into(),
            version: Some(version),
            base,
            path: OnceLock::new(),
        }
    }

    /// Creates the descriptor of an external type.
    #[must_use]
    pub fn external(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            version: None,
            base: None,
            path: OnceLock::new(),
        }
    }

    /// The stable name of the type.
    #[must_use]
    pub fn name(&self) -> &str { &self.name }

    /// The stable name as a shared string.
    #[must_use]
    pub const fn name_arc(&self) -> &Arc<str> { &self.name }

    /// The version of a self-describing type, `None` for external types.
    #[must_use]
    pub const fn version(&self) -> Option<u32> { self.version }

    /// The nearest serializable ancestor, if any.
    #[must_use]
    pub fn base(&self) -> Option<&Arc<Self>> { self.base.as_ref() }

    /// Returns `true` if the type describes its own layout.
    #[must_use]
    pub const fn is_described(&self) -> bool { self.version.is_some() }

    /// The ordered chain of levels from the root ancestor to this type.
    ///
    /// A described type without ancestors has a one-element path; an
    /// external type has an empty one. Computed once and cached.
    pub fn path(&self) -> &[TypeLevel] {
        self.path.get_or_init(|| {
            let mut levels = Vec::new();
            let mut current = Some(self);

            while let Some(descriptor) = current {
                let Some(version) = descriptor.version else { break };

                levels.push(TypeLevel {
                    name: descriptor.name.clone(),
                    version,
                });
                current = descriptor.base.as_deref();
            }

            levels.reverse();
            levels.into_boxed_slice()
        })
    }
}

// =============================================================================
// Writer side
// =============================================================================

/// Assigns stream indices to descriptors in order of first use.
#[derive(Debug, Default)]
pub(crate) struct TypeInterner {
    indices: FxHashMap<Arc<str>, usize>,
}

impl TypeInterner {
    pub(crate) fn get(&self, name: &str) -> Option<usize> {
        self.indices.get(name).copied()
    }

    pub(crate) fn intern(&mut self, name: &Arc<str>) -> usize {
        let next = self.indices.len();
        *self.indices.entry(name.clone()).or_insert(next)
    }

    pub(crate) fn len(&self) -> usize { self.indices.len() }
}

// =============================================================================
// Reader side
// =============================================================================

/// The result of reading a `TypeDescRef`.
#[derive(Debug, Clone)]
pub enum TypeRef {
    /// The null type code.
    Null,

    /// The object root code.
    Root,

    /// A concrete descriptor as recorded by the stream.
    Type(Arc<TypeDescriptor>),
}

/// Rebuilds descriptors in the order the writer interned them.
///
/// An index is reserved before the base of a new type is read so that
/// indices line up with the writer's, which assigns them before recursing.
#[derive(Debug, Default)]
pub(crate) struct TypeResolver {
    entries: Vec<Option<Arc<TypeDescriptor>>>,
}

impl TypeResolver {
    pub(crate) fn reserve(&mut self) -> usize {
        self.entries.push(None);
        self.entries.len() - 1
    }

    pub(crate) fn fill(
        &mut self,
        index: usize,
        descriptor: Arc<TypeDescriptor>,
    ) {
        self.entries[index] = Some(descriptor);
    }

    pub(crate) fn get(&self, index: usize) -> Result<Arc<TypeDescriptor>> {
        match self.entries.get(index) {
            Some(Some(descriptor)) => Ok(descriptor.clone()),
            Some(None) => Err(Error::invalid_data(format!(
                "type #{index} refers to itself as an ancestor"
            ))),
            None => Err(Error::invalid_data(format!(
                "type #{index} was never declared in this stream"
            ))),
        }
    }

    #[cfg(test)]
    pub(crate) fn pending(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_none()).count()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn path_runs_from_root_to_leaf() {
        let animal = Arc::new(TypeDescriptor::described("zoo.Animal", 2, None));
        let dog =
            Arc::new(TypeDescriptor::described("zoo.Dog", 1, Some(animal)));
        let puppy = TypeDescriptor::described("zoo.Puppy", 0, Some(dog));

        let names = puppy
            .path()
            .iter()
            .map(|level| (&*level.name, level.version))
            .collect::<Vec<_>>();

        assert_eq!(
            names,
            [("zoo.Animal", 2), ("zoo.Dog", 1), ("zoo.Puppy", 0)]
        );
    }

    #[test]
    fn root_type_has_single_level_path() {
        let root = TypeDescriptor::described("zoo.Animal", 0, None);
        assert_eq!(root.path().len(), 1);
    }

    #[test]
    fn external_type_has_empty_path() {
        let external = TypeDescriptor::external("i32");
        assert!(external.path().is_empty());
        assert!(!external.is_described());
    }

    #[test]
    fn interner_assigns_dense_indices() {
        let mut interner = TypeInterner::default();
        let a: Arc<str> = Arc::from("a");
        let b: Arc<str> = Arc::from("b");

        assert_eq!(interner.intern(&a), 0);
        assert_eq!(interner.intern(&b), 1);
        assert_eq!(interner.intern(&a), 0);
        assert_eq!(interner.get("b"), Some(1));
        assert_eq!(interner.len(), 2);
    }

    #[test]
    fn resolver_rejects_unknown_and_pending_indices() {
        let mut resolver = TypeResolver::default();
        let index = resolver.reserve();

        assert!(resolver.get(index).is_err());
        assert!(resolver.get(index + 1).is_err());
        assert_eq!(resolver.pending(), 1);

        resolver.fill(index, Arc::new(TypeDescriptor::external("i32")));
        assert_eq!(resolver.get(index).unwrap().name(), "i32");
        assert_eq!(resolver.pending(), 0);
    }
}
