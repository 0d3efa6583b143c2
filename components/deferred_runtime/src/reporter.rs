//! Delayed surfacing of unhandled chain errors.
//!
//! An error that reaches the end of a drain with no errback left to consume
//! it is not thrown on the spot. It is handed to the [`Reporter`], which
//! schedules a rethrow through the scheduler capability; registering an
//! errback before the grace window elapses cancels the rethrow. Errors whose
//! window does elapse are written to the configured [`ErrorSink`].

use deferred_types::DeferredError;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::scheduler::{ScheduleId, Scheduler, TimerQueue};

/// Sink receiving errors whose grace window elapsed.
pub trait ErrorSink {
    /// Reports one unhandled error.
    fn report(&self, error: &DeferredError);
}

/// Default sink that writes to standard error.
#[derive(Debug, Default)]
pub struct StderrSink;

impl ErrorSink for StderrSink {
    fn report(&self, error: &DeferredError) {
        eprintln!("unhandled deferred error: {}", error);
    }
}

/// Sink that captures reports for inspection in tests.
pub struct CaptureSink {
    output: Rc<RefCell<Vec<String>>>,
}

impl CaptureSink {
    /// Creates a capture sink with its own output buffer.
    pub fn new() -> Self {
        Self {
            output: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Creates a capture sink writing into a shared buffer.
    pub fn new_with_output(output: Rc<RefCell<Vec<String>>>) -> Self {
        Self { output }
    }

    /// The messages reported so far.
    pub fn messages(&self) -> Vec<String> {
        self.output.borrow().clone()
    }
}

impl Default for CaptureSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorSink for CaptureSink {
    fn report(&self, error: &DeferredError) {
        self.output
            .borrow_mut()
            .push(format!("unhandled deferred error: {}", error));
    }
}

struct ReporterInner {
    scheduler: Rc<dyn Scheduler>,
    sink: Rc<dyn ErrorSink>,
    grace_ms: u64,
}

/// The construction context every Deferred carries.
///
/// Bundles the scheduler capability, the error sink, and the grace delay
/// for unhandled-error rethrows. Cloning is cheap; clones share the same
/// context.
///
/// # Examples
///
/// ```
/// use deferred_runtime::{CaptureSink, Reporter, TimerQueue};
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let timers = Rc::new(TimerQueue::new());
/// let output = Rc::new(RefCell::new(Vec::new()));
/// let sink = Rc::new(CaptureSink::new_with_output(output.clone()));
/// let reporter = Reporter::with_parts(timers, sink, 0);
/// let _ = reporter;
/// ```
#[derive(Clone)]
pub struct Reporter {
    inner: Rc<ReporterInner>,
}

impl Reporter {
    /// Creates a reporter with a private timer queue and a stderr sink.
    ///
    /// Rethrows scheduled through this reporter surface only when the
    /// embedder drives a shared clock, so embeddings that care about
    /// unhandled-error reporting should construct the reporter with
    /// [`Reporter::with_parts`] around a queue they drive.
    pub fn new() -> Self {
        Self::with_parts(Rc::new(TimerQueue::new()), Rc::new(StderrSink), 0)
    }

    /// Creates a reporter from an injected scheduler, sink, and grace delay.
    pub fn with_parts(
        scheduler: Rc<dyn Scheduler>,
        sink: Rc<dyn ErrorSink>,
        grace_ms: u64,
    ) -> Self {
        Self {
            inner: Rc::new(ReporterInner {
                scheduler,
                sink,
                grace_ms,
            }),
        }
    }

    /// The scheduler capability this reporter schedules through.
    pub fn scheduler(&self) -> Rc<dyn Scheduler> {
        Rc::clone(&self.inner.scheduler)
    }

    /// The grace delay in milliseconds before an unhandled error surfaces.
    pub fn grace_ms(&self) -> u64 {
        self.inner.grace_ms
    }

    pub(crate) fn schedule_rethrow(&self, error: DeferredError) -> ScheduleId {
        let sink = Rc::clone(&self.inner.sink);
        self.inner
            .scheduler
            .schedule(self.inner.grace_ms, Box::new(move || sink.report(&error)))
    }

    pub(crate) fn unschedule_rethrow(&self, ticket: ScheduleId) {
        self.inner.scheduler.cancel(ticket);
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter")
            .field("grace_ms", &self.inner.grace_ms)
            .finish()
    }
}
