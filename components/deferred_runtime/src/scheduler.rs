//! Scheduler capability and the deterministic timer queue.
//!
//! The runtime never touches real timers. Everything that must happen
//! "later" - the delayed rethrow of an unhandled error, timer-produced
//! Deferreds - is expressed against the [`Scheduler`] capability, and the
//! embedder decides when time passes by driving a [`TimerQueue`].

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use deferred_types::Value;

use crate::deferred::Deferred;
use crate::reporter::Reporter;

/// Ticket identifying a scheduled job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScheduleId(u64);

/// A unit of delayed work.
pub type Job = Box<dyn FnOnce()>;

/// Capability for scheduling cancelable delayed jobs.
///
/// Deferred construction contexts carry one of these so tests can inject a
/// deterministic clock instead of real timers.
pub trait Scheduler {
    /// Schedules `job` to run once `delay_ms` milliseconds have elapsed.
    fn schedule(&self, delay_ms: u64, job: Job) -> ScheduleId;

    /// Cancels a previously scheduled job. Unknown tickets are ignored.
    fn cancel(&self, ticket: ScheduleId);
}

struct TimerEntry {
    ticket: ScheduleId,
    due_ms: u64,
    job: Job,
}

#[derive(Default)]
struct TimerQueueState {
    now_ms: u64,
    next_ticket: u64,
    entries: Vec<TimerEntry>,
}

/// Deterministic virtual-clock scheduler.
///
/// Jobs run only when the clock is advanced past their due time, in due
/// order, ties broken by scheduling order. Jobs scheduled while an
/// [`advance`](TimerQueue::advance) is in progress run in the same pass if
/// their due time falls within it.
///
/// # Examples
///
/// ```
/// use deferred_runtime::{Scheduler, TimerQueue};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let timers = TimerQueue::new();
/// let ran = Rc::new(Cell::new(false));
/// let flag = ran.clone();
/// timers.schedule(10, Box::new(move || flag.set(true)));
///
/// assert!(!ran.get());
/// timers.advance(10);
/// assert!(ran.get());
/// ```
#[derive(Default)]
pub struct TimerQueue {
    state: RefCell<TimerQueueState>,
}

impl TimerQueue {
    /// Creates a timer queue with the clock at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current virtual time in milliseconds.
    pub fn now(&self) -> u64 {
        self.state.borrow().now_ms
    }

    /// The number of jobs still waiting to run.
    pub fn pending(&self) -> usize {
        self.state.borrow().entries.len()
    }

    /// Moves the clock forward by `delta_ms`, running every job that comes
    /// due along the way. Returns the number of jobs run.
    pub fn advance(&self, delta_ms: u64) -> usize {
        let target = self.state.borrow().now_ms + delta_ms;
        let mut run = 0;
        loop {
            let job = {
                let mut state = self.state.borrow_mut();
                let next = state
                    .entries
                    .iter()
                    .enumerate()
                    .filter(|(_, entry)| entry.due_ms <= target)
                    .min_by_key(|(_, entry)| (entry.due_ms, entry.ticket.0))
                    .map(|(index, _)| index);
                match next {
                    Some(index) => {
                        let entry = state.entries.remove(index);
                        if entry.due_ms > state.now_ms {
                            state.now_ms = entry.due_ms;
                        }
                        Some(entry.job)
                    }
                    None => {
                        state.now_ms = target;
                        None
                    }
                }
            };
            match job {
                Some(job) => {
                    job();
                    run += 1;
                }
                None => break,
            }
        }
        run
    }

    /// Runs every job already due at the current time.
    pub fn run_due(&self) -> usize {
        self.advance(0)
    }

    /// Produces a Deferred that fires with the virtual timestamp once the
    /// clock passes `delay_ms` from now.
    ///
    /// Canceling the Deferred before it fires unschedules the underlying
    /// timer job.
    pub fn delay(self: &Rc<Self>, reporter: &Reporter, delay_ms: u64) -> Deferred {
        let due = self.now() + delay_ms;
        let ticket_slot: Rc<Cell<Option<ScheduleId>>> = Rc::new(Cell::new(None));

        let queue = Rc::clone(self);
        let slot = Rc::clone(&ticket_slot);
        let deferred = Deferred::with_canceler(reporter, move |_canceled| {
            if let Some(ticket) = slot.get() {
                queue.cancel(ticket);
            }
        });

        let fired = deferred.clone();
        let ticket = self.schedule(
            delay_ms,
            Box::new(move || {
                let _ = fired.resolve(Value::Double(due as f64));
            }),
        );
        ticket_slot.set(Some(ticket));
        deferred
    }
}

impl Scheduler for TimerQueue {
    fn schedule(&self, delay_ms: u64, job: Job) -> ScheduleId {
        let mut state = self.state.borrow_mut();
        let ticket = ScheduleId(state.next_ticket);
        state.next_ticket += 1;
        let due_ms = state.now_ms + delay_ms;
        state.entries.push(TimerEntry {
            ticket,
            due_ms,
            job,
        });
        ticket
    }

    fn cancel(&self, ticket: ScheduleId) {
        let mut state = self.state.borrow_mut();
        state.entries.retain(|entry| entry.ticket != ticket);
    }
}

impl fmt::Debug for TimerQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("TimerQueue")
            .field("now_ms", &state.now_ms)
            .field("pending", &state.entries.len())
            .finish()
    }
}
