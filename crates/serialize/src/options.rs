//! Per-session settings for writers and readers.
//!
//! # Example
//!
//! ```ignore
//! use skein_serialize::{Options, Registry, Value};
//!
//! // catch writer/reader drift early while developing a new type
//! let options = Options::new().with_sentinels(true);
//!
//! let registry = Registry::global();
//! let bytes = skein_serialize::to_bytes_with(&root, registry, options)?;
//! let back = skein_serialize::from_bytes_with(&bytes, registry, options)?;
//! ```

/// Settings shared by one [`GraphWriter`](crate::GraphWriter) or
/// [`GraphReader`](crate::GraphReader) session.
///
/// # Configurable Settings
///
/// - [`sentinels`](Options::sentinels) - Write (and expect) a sentinel after
///   every object body and wherever a type calls
///   [`GraphWriter::sentinel`](crate::GraphWriter::sentinel). A stream
///   written with sentinels must be read with sentinels.
/// - [`max_depth`](Options::max_depth) - The deepest nesting of objects a
///   session accepts before failing with
///   [`Error::DepthExceeded`](crate::Error::DepthExceeded).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Options {
    sentinels: bool,
    max_depth: usize,
}

impl Options {
    /// The nesting limit used by [`Options::new`].
    ///
    /// Each nested object costs a handful of stack frames; this keeps deep
    /// chains well inside the default thread stack.
    pub const DEFAULT_MAX_DEPTH: usize = 256;

    /// Sentinels off, default nesting limit.
    #[must_use]
    pub const fn new() -> Self {
        Self { sentinels: false, max_depth: Self::DEFAULT_MAX_DEPTH }
    }

    /// Enables or disables debug sentinels.
    #[must_use]
    pub const fn with_sentinels(mut self, sentinels: bool) -> Self {
        self.sentinels = sentinels;
        self
    }

    /// Sets the nesting limit.
    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Whether debug sentinels are written and checked.
    #[must_use]
    pub const fn sentinels(&self) -> bool { self.sentinels }

    /// The nesting limit.
    #[must_use]
    pub const fn max_depth(&self) -> usize { self.max_depth }
}

impl Default for Options {
    fn default() -> Self { Self::new() }
}
