//! Handler sequencing for deferred execution chains.
//!
//! This module provides the queue of success/failure handler pairs owned by
//! one Deferred, and the boxed handler wrapper those entries store.

use deferred_types::{DeferredError, Value};
use std::collections::VecDeque;
use std::fmt;

use crate::deferred::Deferred;

/// What a handler hands back to its chain.
///
/// Most handlers return a plain [`Value`], which becomes the chain's current
/// result. Returning a Deferred instead suspends the chain until that
/// Deferred fires.
pub enum Resolution {
    /// A plain payload.
    Value(Value),
    /// A nested Deferred to suspend on.
    Deferred(Deferred),
}

impl From<Value> for Resolution {
    fn from(value: Value) -> Self {
        Resolution::Value(value)
    }
}

impl From<Deferred> for Resolution {
    fn from(deferred: Deferred) -> Self {
        Resolution::Deferred(deferred)
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Resolution::Deferred(d) => f.debug_tuple("Deferred").field(&d.id()).finish(),
        }
    }
}

/// Outcome of invoking a handler.
///
/// `Ok` carries the handler's return value; `Err` models a thrown error,
/// which the drain loop catches and converts into the next errback's input.
pub type HandlerResult = Result<Resolution, DeferredError>;

/// A success or failure continuation stored in a sequence queue.
///
/// Handlers receive the chain's current result and the scope the entry was
/// registered with (or the owning Deferred's default scope).
pub struct Handler {
    callback: Box<dyn FnMut(Value, &Value) -> HandlerResult>,
}

impl Handler {
    /// Creates a handler from a closure receiving `(result, scope)`.
    pub fn new<F>(f: F) -> Self
    where
        F: FnMut(Value, &Value) -> HandlerResult + 'static,
    {
        Self {
            callback: Box::new(f),
        }
    }

    /// Invokes the handler with the chain's current result.
    pub fn call(&mut self, value: Value, scope: &Value) -> HandlerResult {
        (self.callback)(value, scope)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler {{ ... }}")
    }
}

/// One queue entry: the success and failure slots plus an optional scope.
///
/// Either slot may be empty; an empty slot is skipped during the drain,
/// carrying the current result forward unchanged.
#[derive(Debug)]
pub struct SequenceEntry {
    /// Handler selected when the current result is a success.
    pub on_success: Option<Handler>,
    /// Handler selected when the current result is error-shaped.
    pub on_failure: Option<Handler>,
    /// Execution scope for this entry, overriding the default scope.
    pub scope: Option<Value>,
}

/// The ordered list of sequence entries belonging to one Deferred.
///
/// Entries execute strictly FIFO. The queue is owned exclusively by its
/// Deferred and mutated only from the drain loop and the public
/// handler-registration methods.
#[derive(Debug, Default)]
pub struct SequenceQueue {
    entries: VecDeque<SequenceEntry>,
}

impl SequenceQueue {
    /// Creates a new empty queue.
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    /// Appends an entry to the end of the queue.
    pub fn push(&mut self, entry: SequenceEntry) {
        self.entries.push_back(entry);
    }

    /// Removes and returns the front entry.
    pub fn pop(&mut self) -> Option<SequenceEntry> {
        self.entries.pop_front()
    }

    /// Returns true if no entries remain.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of queued entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if any remaining entry has a failure handler.
    ///
    /// The drain loop uses this to decide whether an error still has a
    /// chance of being consumed further down the queue.
    pub fn has_failure_handler(&self) -> bool {
        self.entries.iter().any(|entry| entry.on_failure.is_some())
    }
}
