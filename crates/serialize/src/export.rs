//! Flattening instances into name/value properties.
//!
//! Export is the third capability of a [`Driver`](crate::Driver). It is
//! used by observers that need a property view of an object (watchers,
//! debuggers) rather than its binary form.

use std::sync::Arc;

use crate::{persist::Persist, value::Value};

/// An ordered list of named values produced by an export.
///
/// Ancestor levels are exported first, so a derived level may shadow a
/// property of its base; [`get`](Properties::get) returns the most derived
/// one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    entries: Vec<(String, Value)>,
}

impl Properties {
    /// Creates an empty property list.
    #[must_use]
    pub const fn new() -> Self { Self { entries: Vec::new() } }

    /// Appends a property.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Returns the most recently inserted property called `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .rev()
            .find(|(entry, _)| entry == name)
            .map(|(_, value)| value)
    }

    /// Iterates over the properties in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of properties.
    #[must_use]
    pub fn len(&self) -> usize { self.entries.len() }

    /// Returns `true` if there are no properties.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

/// Conversion of a field into an exported [`Value`].
pub trait Export {
    /// Returns the exported representation.
    fn to_value(&self) -> Value;
}

impl<T: Export + ?Sized> Export for &T {
    fn to_value(&self) -> Value { (**self).to_value() }
}

impl<T: Export> Export for Option<T> {
    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, Export::to_value)
    }
}

impl<T: Persist> Export for Arc<T> {
    fn to_value(&self) -> Value { Value::shared(self) }
}

impl<T: Export> Export for Vec<T> {
    fn to_value(&self) -> Value {
        Value::object(self.iter().map(Export::to_value).collect::<Vec<_>>())
    }
}

impl Export for Value {
    fn to_value(&self) -> Value { self.clone() }
}

impl Export for str {
    fn to_value(&self) -> Value { Value::from(self) }
}
