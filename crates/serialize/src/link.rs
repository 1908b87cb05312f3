//! Settable references for cyclic graphs.
//!
//! An `Arc<T>` field must be complete before its owner exists, so it cannot
//! point back at an ancestor that is still being read. A [`Link`] can: when
//! the reader meets a back-reference to an instance under construction, it
//! leaves the link empty and fills it once the outermost read returns.
//!
//! ```ignore
//! #[derive(Persist)]
//! #[persist(version = 0, name = "graph.Node")]
//! struct Node {
//!     name: String,
//!     next: Link<Node>,
//! }
//!
//! let a = Arc::new(Node { name: "a".into(), next: Link::empty() });
//! a.next.set(Some(a.clone()));
//! ```
//!
//! A link that closes a cycle keeps every instance on the cycle alive; call
//! [`Link::set`] with `None` to break it.

use std::{fmt, sync::Arc};

use parking_lot::RwLock;

use crate::{
    decode::Decode,
    encode::Encode,
    error::Result,
    export::Export,
    persist::Persist,
    reader::{Fetched, GraphReader},
    value::Value,
    writer::GraphWriter,
};

/// A shared, settable, nullable reference to a `T`.
///
/// Clones are handles to the same cell.
pub struct Link<T> {
    cell: Arc<RwLock<Option<Arc<T>>>>,
}

impl<T> Link<T> {
    /// Creates a link to `target`.
    #[must_use]
    pub fn new(target: Arc<T>) -> Self {
        Self { cell: Arc::new(RwLock::new(Some(target))) }
    }

    /// Creates an empty link.
    #[must_use]
    pub fn empty() -> Self { Self { cell: Arc::new(RwLock::new(None)) } }

    /// The current target.
    #[must_use]
    pub fn get(&self) -> Option<Arc<T>> { self.cell.read().clone() }

    /// Replaces the target.
    pub fn set(&self, target: Option<Arc<T>>) { *self.cell.write() = target; }

    /// Returns `true` if the link has no target.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.cell.read().is_none() }

    /// Returns `true` if the link targets exactly `other`.
    #[must_use]
    pub fn points_to(&self, other: &Arc<T>) -> bool {
        self.cell
            .read()
            .as_ref()
            .is_some_and(|target| Arc::ptr_eq(target, other))
    }
}

impl<T> Clone for Link<T> {
    fn clone(&self) -> Self { Self { cell: self.cell.clone() } }
}

impl<T> Default for Link<T> {
    fn default() -> Self { Self::empty() }
}

impl<T> fmt::Debug for Link<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // the target may point back here
        match &*self.cell.read() {
            Some(target) => write!(f, "Link({:p})", Arc::as_ptr(target)),
            None => f.write_str("Link(empty)"),
        }
    }
}

impl<T: Persist> Encode for Link<T> {
    fn encode(&self, writer: &mut GraphWriter<'_>) -> Result<()> {
        let target = self.get();
        writer.write_deferrable(|writer| writer.write_nullable(target.as_ref()))
    }
}

impl<T: Persist> Decode for Link<T> {
    fn decode(reader: &mut GraphReader<'_>) -> Result<Self> {
        reader.registry().resolve::<T>()?;
        let link = Self::empty();

        match reader.read_fetched()? {
            Fetched::Ready(Value::Null) => {}
            Fetched::Ready(value) => link.set(Some(value.downcast::<T>()?)),
            Fetched::Pending(index) => {
                let cell = link.cell.clone();
                reader.defer(index, move |value| {
                    *cell.write() = Some(value.downcast::<T>()?);
                    Ok(())
                });
            }
        }

        Ok(link)
    }
}

impl<T: Persist> Export for Link<T> {
    fn to_value(&self) -> Value { self.get().to_value() }
}
