//! Deferred asynchronous-result runtime.
//!
//! This crate provides a single-assignment asynchronous result primitive:
//! a producer fires a [`Deferred`] exactly once, and consumers attach
//! ordered success/failure handler chains before or after that firing.
//!
//! # Overview
//!
//! - [`Deferred`] - The state machine: firing, handler chains, branching,
//!   suspension on nested results, cancellation propagation
//! - [`DeferredList`] - Aggregate Deferred over a set of members
//! - [`TimerQueue`] - Deterministic virtual-clock scheduler and producer of
//!   timer Deferreds
//! - [`Reporter`] - Construction context: scheduler capability, error sink,
//!   and the grace window for unhandled-error rethrows
//!
//! # Examples
//!
//! ## Chaining handlers
//!
//! ```
//! use deferred_runtime::{Deferred, Reporter, Resolution};
//! use deferred_types::Value;
//!
//! let reporter = Reporter::new();
//! let deferred = Deferred::new(&reporter);
//! deferred.add_callback(|value| match value {
//!     Value::Smi(n) => Ok(Resolution::Value(Value::Smi(n * 2))),
//!     other => Ok(Resolution::Value(other)),
//! });
//! deferred.resolve(Value::Smi(21)).unwrap();
//! assert_eq!(deferred.result(), Value::Smi(42));
//! ```
//!
//! ## Normalizing values and Deferreds
//!
//! ```
//! use deferred_runtime::{Deferred, Reporter, Resolution};
//! use deferred_types::Value;
//!
//! let reporter = Reporter::new();
//! let doubled = Deferred::when(&reporter, Value::Smi(5), |value| match value {
//!     Value::Smi(n) => Ok(Resolution::Value(Value::Smi(n * 2))),
//!     other => Ok(Resolution::Value(other)),
//! });
//! assert_eq!(doubled.result(), Value::Smi(10));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod deferred;
pub mod list;
pub mod reporter;
pub mod scheduler;
pub mod sequence;

// Re-export main types at crate root
pub use deferred::{CancelHook, Deferred};
pub use list::{gather_results, DeferredList, DeferredListOptions};
pub use reporter::{CaptureSink, ErrorSink, Reporter, StderrSink};
pub use scheduler::{Job, ScheduleId, Scheduler, TimerQueue};
pub use sequence::{Handler, HandlerResult, Resolution, SequenceEntry, SequenceQueue};
