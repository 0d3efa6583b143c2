//! Dynamic payload values carried through deferred chains.
//!
//! This module provides the `Value` enum that represents every payload a
//! Deferred can hold, including the error-shaped values that travel the
//! failure side of a handler chain.

use crate::DeferredError;
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Represents any payload a Deferred can carry.
///
/// Primitive values are stored inline; structured values are reference
/// counted so a result can flow through several continuation chains without
/// copying.
///
/// Two predicates drive the drain algorithm: [`Value::is_error`] decides
/// which handler slot runs next, and [`Value::same`] is the identity check
/// used to decide whether a handler's return value keeps or clears the
/// error state.
///
/// # Examples
///
/// ```
/// use deferred_types::{DeferredError, Value};
///
/// let number = Value::Smi(42);
/// assert!(!number.is_error());
///
/// let error = Value::error(DeferredError::application("boom"));
/// assert!(error.is_error());
/// ```
#[derive(Clone)]
pub enum Value {
    /// Absent value; handlers return this to leave the chain result untouched.
    Undefined,
    /// Explicit null payload.
    Null,
    /// Boolean payload.
    Boolean(bool),
    /// Small integer payload.
    Smi(i32),
    /// IEEE 754 double-precision payload.
    Double(f64),
    /// String payload.
    String(std::string::String),
    /// Ordered list payload, used for aggregate results.
    List(Rc<Vec<Value>>),
    /// Error-shaped payload.
    Error(Rc<DeferredError>),
    /// Opaque application object.
    NativeObject(Rc<RefCell<dyn Any>>),
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "Undefined"),
            Value::Null => write!(f, "Null"),
            Value::Boolean(b) => f.debug_tuple("Boolean").field(b).finish(),
            Value::Smi(n) => f.debug_tuple("Smi").field(n).finish(),
            Value::Double(n) => f.debug_tuple("Double").field(n).finish(),
            Value::String(s) => f.debug_tuple("String").field(s).finish(),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
            Value::Error(e) => f.debug_tuple("Error").field(&e.message).finish(),
            Value::NativeObject(_) => write!(f, "NativeObject(...)"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Smi(a), Value::Smi(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Error(a), Value::Error(b)) => Rc::ptr_eq(a, b),
            (Value::NativeObject(a), Value::NativeObject(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Smi(n) => write!(f, "{}", n),
            Value::Double(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Error(e) => write!(f, "{}", e.message),
            Value::NativeObject(_) => write!(f, "[object]"),
        }
    }
}

impl Value {
    /// Wraps an error into an error-shaped value.
    pub fn error(error: DeferredError) -> Value {
        Value::Error(Rc::new(error))
    }

    /// Wraps a list of values.
    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(items))
    }

    /// Returns whether this value is error-shaped.
    ///
    /// Error-shaped values select the failure handler of the next queue
    /// entry when they are the current chain result.
    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    /// Returns whether this value is `Undefined`.
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Identity comparison.
    ///
    /// Reference-counted variants compare by pointer, primitives by value,
    /// so a handler that returns the very error it received is recognized
    /// as returning the same value while a reconstructed equal error is
    /// not.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Error(a), Value::Error(b)) => Rc::ptr_eq(a, b),
            (Value::NativeObject(a), Value::NativeObject(b)) => Rc::ptr_eq(a, b),
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Smi(a), Value::Smi(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            _ => false,
        }
    }

    /// Borrows the wrapped error for error-shaped values.
    pub fn as_error(&self) -> Option<&DeferredError> {
        match self {
            Value::Error(e) => Some(e),
            _ => None,
        }
    }

    /// The name of this value's type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Smi(_) | Value::Double(_) => "number",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Error(_) => "error",
            Value::NativeObject(_) => "object",
        }
    }
}
