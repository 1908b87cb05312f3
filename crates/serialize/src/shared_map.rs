//! A dictionary whose entries may close cycles.

use std::{
    collections::HashMap,
    fmt,
    hash::{Hash, RandomState},
    sync::Arc,
};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{
    containers::{self, Comparer, Element},
    decode::Decode,
    encode::Encode,
    error::{Error, Result},
    reader::{Fetched, GraphReader},
    writer::GraphWriter,
};

/// A shared, lockable [`HashMap`] with the wire layout of a dictionary.
///
/// Unlike a plain `HashMap`, an entry whose key or value is a
/// back-reference to an instance still under construction is not an error:
/// the entry is inserted once the outermost read returns, after every
/// single-reference fix-up has run.
///
/// Clones are handles to the same map.
pub struct SharedMap<K, V, S = RandomState> {
    inner: Arc<RwLock<HashMap<K, V, S>>>,
}

impl<K, V, S: Default> SharedMap<K, V, S> {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self { Self::with_hasher(S::default()) }
}

impl<K, V, S> SharedMap<K, V, S> {
    /// Creates an empty map with the given comparer.
    #[must_use]
    pub fn with_hasher(hasher: S) -> Self {
        Self { inner: Arc::new(RwLock::new(HashMap::with_hasher(hasher))) }
    }

    /// Locks the map for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, HashMap<K, V, S>> {
        self.inner.read()
    }

    /// Locks the map for writing.
    pub fn write(&self) -> RwLockWriteGuard<'_, HashMap<K, V, S>> {
        self.inner.write()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize { self.inner.read().len() }

    /// Returns `true` if the map has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.inner.read().is_empty() }
}

impl<K: Eq + Hash, V, S: std::hash::BuildHasher> SharedMap<K, V, S> {
    /// Inserts an entry, returning the previous value of the key.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.inner.write().insert(key, value)
    }

    /// Removes an entry.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.inner.write().remove(key)
    }

    /// Returns a copy of the value of `key`.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.inner.read().get(key).cloned()
    }

    /// Returns `true` if the map has an entry for `key`.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.read().contains_key(key)
    }
}

impl<K, V, S> Clone for SharedMap<K, V, S> {
    fn clone(&self) -> Self { Self { inner: self.inner.clone() } }
}

impl<K, V, S: Default> Default for SharedMap<K, V, S> {
    fn default() -> Self { Self::new() }
}

impl<K, V, S> fmt::Debug for SharedMap<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // entries may point back at the owner of this map
        f.debug_struct("SharedMap").field("len", &self.len()).finish()
    }
}

impl<K, V, S> Encode for SharedMap<K, V, S>
where
    K: Element + Eq + Hash,
    V: Element,
    S: Comparer,
{
    fn encode(&self, writer: &mut GraphWriter<'_>) -> Result<()> {
        let entries = self.inner.read();
        writer.write_deferrable(|writer| entries.encode(writer))
    }
}

fn duplicate_key() -> Error { Error::invalid_data("duplicate dictionary key") }

impl<K, V, S> Decode for SharedMap<K, V, S>
where
    K: Element + Eq + Hash,
    V: Element,
    S: Comparer + 'static,
{
    fn decode(reader: &mut GraphReader<'_>) -> Result<Self> {
        let len = containers::require_count(reader)?;
        let hasher = S::read_comparer(reader)?;
        let map = Self {
            inner: Arc::new(RwLock::new(HashMap::with_capacity_and_hasher(
                len.min(containers::PREALLOCATE_LIMIT),
                hasher,
            ))),
        };

        let key_header = reader.read_element_header::<K>()?;
        let value_header = reader.read_element_header::<V>()?;

        for _ in 0..len {
            let key = containers::read_item::<K>(reader, &key_header)?;
            let value = containers::read_item::<V>(reader, &value_header)?;

            match (key, value) {
                (Fetched::Ready(key), Fetched::Ready(value)) => {
                    if map.insert(key, value).is_some() {
                        return Err(duplicate_key());
                    }
                }
                (key, value) => {
                    let map = map.clone();
                    reader.defer_pair(move |objects| {
                        let key = key.resolve(objects)?;
                        let value = value.resolve(objects)?;

                        match map.insert(key, value) {
                            Some(_) => Err(duplicate_key()),
                            None => Ok(()),
                        }
                    });
                }
            }
        }

        Ok(map)
    }
}
