//! Per-Deferred identifiers.
//!
//! Every Deferred is tagged with an id at construction. Ids show up in
//! error messages and in reporter bookkeeping so an unhandled error can be
//! traced back to the chain that produced it.

use std::cell::Cell;
use std::fmt;

thread_local! {
    static NEXT_ID: Cell<u64> = Cell::new(1);
}

/// Identifies a single Deferred.
///
/// Ids are handed out by a thread-local counter, so they are unique within
/// the logical thread of control the runtime executes on and require no
/// global registry.
///
/// # Examples
///
/// ```
/// use deferred_types::DeferredId;
///
/// let a = DeferredId::next();
/// let b = DeferredId::next();
/// assert_ne!(a, b);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeferredId(u64);

impl DeferredId {
    /// Hands out the next identifier on this thread.
    pub fn next() -> Self {
        NEXT_ID.with(|cell| {
            let id = cell.get();
            cell.set(id + 1);
            DeferredId(id)
        })
    }

    /// The raw numeric form of this id.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DeferredId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "deferred#{}", self.0)
    }
}
