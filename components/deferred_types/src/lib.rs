//! Core payload and error types for the deferred runtime.
//!
//! This crate provides the foundational types the asynchronous-result
//! primitive is built on: the dynamic payload representation, the error
//! taxonomy, and per-Deferred identifiers.
//!
//! # Overview
//!
//! - [`Value`] - Dynamic payload carried through handler chains
//! - [`DeferredError`] - Errors produced by or flowing through a Deferred
//! - [`ErrorKind`] - The error taxonomy tags
//! - [`DeferredId`] - Per-Deferred identifier for diagnostics
//!
//! # Examples
//!
//! ```
//! use deferred_types::{DeferredError, ErrorKind, Value};
//!
//! // Payloads
//! let result = Value::Smi(42);
//! assert!(!result.is_error());
//!
//! // Errors flow through chains as error-shaped values
//! let failure = Value::error(DeferredError::application("connection lost"));
//! assert!(failure.is_error());
//! assert_eq!(failure.as_error().unwrap().kind, ErrorKind::Application);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod id;
mod value;

pub use error::{DeferredError, ErrorKind};
pub use id::DeferredId;
pub use value::Value;
