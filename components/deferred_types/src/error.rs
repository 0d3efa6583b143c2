//! Error taxonomy for the deferred runtime.
//!
//! Two distinct error channels meet here. Misuse of the firing methods is
//! reported synchronously as an `Err(DeferredError)` from the method itself.
//! Errors travelling through a handler chain are data: they ride along as an
//! error-shaped [`Value`](crate::Value) until an errback consumes them.

use crate::{DeferredId, Value};
use thiserror::Error;

/// The kind of deferred error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// `resolve`/`reject` was invoked on a Deferred that already fired.
    AlreadyFired,
    /// Produced by `cancel` when no cancel hook supplied its own resolution.
    Canceled,
    /// An application-supplied error payload.
    Application,
}

/// An error produced by, or flowing through, a Deferred.
///
/// Carries the taxonomy tag, a human-readable message, the id of the
/// Deferred it originated from when known, and the application payload for
/// wrapped rejection values.
///
/// # Examples
///
/// ```
/// use deferred_types::{DeferredError, DeferredId, ErrorKind};
///
/// let id = DeferredId::next();
/// let error = DeferredError::already_fired(id);
/// assert_eq!(error.kind, ErrorKind::AlreadyFired);
/// assert_eq!(error.origin, Some(id));
/// ```
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct DeferredError {
    /// The taxonomy tag.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
    /// The Deferred this error originated from, when known.
    pub origin: Option<DeferredId>,
    /// The application payload this error wraps, if any.
    pub payload: Option<Value>,
}

impl DeferredError {
    /// A firing method was called on a Deferred that already fired.
    pub fn already_fired(origin: DeferredId) -> Self {
        DeferredError {
            kind: ErrorKind::AlreadyFired,
            message: format!("{} has already been fired", origin),
            origin: Some(origin),
            payload: None,
        }
    }

    /// The payload used when a Deferred is canceled without a hook of its
    /// own resolving it.
    pub fn canceled(origin: DeferredId) -> Self {
        DeferredError {
            kind: ErrorKind::Canceled,
            message: format!("{} was canceled", origin),
            origin: Some(origin),
            payload: None,
        }
    }

    /// An application error with the given message.
    pub fn application(message: impl Into<String>) -> Self {
        DeferredError {
            kind: ErrorKind::Application,
            message: message.into(),
            origin: None,
            payload: None,
        }
    }

    /// Wraps a non-error-shaped rejection payload so it can travel the
    /// failure side of a chain.
    pub fn wrap(payload: Value, origin: DeferredId) -> Self {
        DeferredError {
            kind: ErrorKind::Application,
            message: format!("{}", payload),
            origin: Some(origin),
            payload: Some(payload),
        }
    }

    /// Attaches an application payload.
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// True if this error marks a cancellation.
    pub fn is_canceled(&self) -> bool {
        self.kind == ErrorKind::Canceled
    }
}
