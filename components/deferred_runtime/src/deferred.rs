//! The Deferred state machine.
//!
//! A Deferred is a single-assignment asynchronous result: a producer fires
//! it exactly once with `resolve` or `reject`, and consumers attach ordered
//! chains of success/failure handlers before or after that firing. Handlers
//! may branch the chain, suspend it on another Deferred, and propagate
//! cancellation back through the parent/branch graph.
//!
//! Everything here runs on one logical thread. "Blocked" means this
//! Deferred's queue is paused on a nested result, never that a thread is
//! parked.

use deferred_types::{DeferredError, DeferredId, Value};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::reporter::Reporter;
use crate::scheduler::ScheduleId;
use crate::sequence::{Handler, HandlerResult, Resolution, SequenceEntry, SequenceQueue};

/// Hook invoked when a pending Deferred is canceled.
///
/// Receives a handle to the Deferred being canceled so it can supply its
/// own resolution; if it leaves the Deferred unfired, a cancellation error
/// is installed after it returns.
pub type CancelHook = Box<dyn FnOnce(Deferred)>;

struct DeferredState {
    id: DeferredId,
    reporter: Reporter,
    result: Value,
    had_error: bool,
    fired: bool,
    blocked: bool,
    blocking: bool,
    silently_canceled: bool,
    draining: bool,
    parent: Option<Weak<RefCell<DeferredState>>>,
    branch_count: u32,
    on_cancel: Option<CancelHook>,
    default_scope: Value,
    queue: SequenceQueue,
    blocked_on: Option<Deferred>,
    rethrow: Option<ScheduleId>,
}

/// A single-assignment asynchronous result with chained handlers.
///
/// `Deferred` is a cheap handle; clones refer to the same underlying chain.
///
/// # Examples
///
/// ```
/// use deferred_runtime::{Deferred, Reporter, Resolution};
/// use deferred_types::Value;
///
/// let reporter = Reporter::new();
/// let deferred = Deferred::new(&reporter);
/// deferred.add_callback(|value| match value {
///     Value::Smi(n) => Ok(Resolution::Value(Value::Smi(n + 1))),
///     other => Ok(Resolution::Value(other)),
/// });
/// deferred.resolve(Value::Smi(41)).unwrap();
/// assert_eq!(deferred.result(), Value::Smi(42));
/// ```
#[derive(Clone)]
pub struct Deferred {
    inner: Rc<RefCell<DeferredState>>,
}

impl Deferred {
    /// Creates a pending Deferred.
    pub fn new(reporter: &Reporter) -> Self {
        Self::build(reporter, None, Value::Undefined)
    }

    /// Creates a pending Deferred with a cancel hook.
    ///
    /// The hook runs when `cancel` is called before firing; it may fire the
    /// Deferred itself to supply a custom resolution.
    pub fn with_canceler<F>(reporter: &Reporter, on_cancel: F) -> Self
    where
        F: FnOnce(Deferred) + 'static,
    {
        Self::build(reporter, Some(Box::new(on_cancel)), Value::Undefined)
    }

    /// Creates a pending Deferred whose handlers run with `default_scope`
    /// unless their entry carries a scope of its own.
    pub fn with_scope(reporter: &Reporter, default_scope: Value) -> Self {
        Self::build(reporter, None, default_scope)
    }

    /// Creates a pending Deferred with both a cancel hook and a default
    /// scope.
    pub fn with_canceler_and_scope<F>(
        reporter: &Reporter,
        on_cancel: F,
        default_scope: Value,
    ) -> Self
    where
        F: FnOnce(Deferred) + 'static,
    {
        Self::build(reporter, Some(Box::new(on_cancel)), default_scope)
    }

    fn build(reporter: &Reporter, on_cancel: Option<CancelHook>, default_scope: Value) -> Self {
        Deferred {
            inner: Rc::new(RefCell::new(DeferredState {
                id: DeferredId::next(),
                reporter: reporter.clone(),
                result: Value::Undefined,
                had_error: false,
                fired: false,
                blocked: false,
                blocking: false,
                silently_canceled: false,
                draining: false,
                parent: None,
                branch_count: 0,
                on_cancel,
                default_scope,
                queue: SequenceQueue::new(),
                blocked_on: None,
                rethrow: None,
            })),
        }
    }

    /// This Deferred's identifier.
    pub fn id(&self) -> DeferredId {
        self.inner.borrow().id
    }

    /// Returns whether `resolve`, `reject`, or `cancel` has fired this
    /// Deferred.
    pub fn is_fired(&self) -> bool {
        self.inner.borrow().fired
    }

    /// Returns whether this Deferred's queue is suspended on a nested
    /// Deferred.
    pub fn is_blocked(&self) -> bool {
        self.inner.borrow().blocked
    }

    /// Returns whether the current result is travelling the failure side of
    /// the chain.
    pub fn had_error(&self) -> bool {
        self.inner.borrow().had_error
    }

    /// The current result. `Undefined` until the Deferred fires.
    pub fn result(&self) -> Value {
        self.inner.borrow().result.clone()
    }

    /// The construction context this Deferred reports through.
    pub fn reporter(&self) -> Reporter {
        self.inner.borrow().reporter.clone()
    }

    /// Fires this Deferred with a success value and drains the queue.
    ///
    /// # Errors
    ///
    /// Returns an `AlreadyFired` error if the Deferred has fired, unless
    /// the firing was a silent cancellation, which permits exactly one
    /// re-fire.
    pub fn resolve(&self, value: Value) -> Result<(), DeferredError> {
        self.check_not_fired()?;
        self.update_result(false, value);
        Ok(())
    }

    /// Fires this Deferred with an error and drains the queue.
    ///
    /// A payload that is not already error-shaped is wrapped so it can
    /// travel the failure side of the chain.
    ///
    /// # Errors
    ///
    /// Returns an `AlreadyFired` error under the same conditions as
    /// [`Deferred::resolve`].
    pub fn reject(&self, error: Value) -> Result<(), DeferredError> {
        self.check_not_fired()?;
        let error = self.wrap_rejection(error);
        self.update_result(true, error);
        Ok(())
    }

    fn wrap_rejection(&self, error: Value) -> Value {
        if error.is_error() {
            error
        } else {
            Value::error(DeferredError::wrap(error, self.id()))
        }
    }

    fn check_not_fired(&self) -> Result<(), DeferredError> {
        let mut state = self.inner.borrow_mut();
        if state.fired {
            if !state.silently_canceled {
                return Err(DeferredError::already_fired(state.id));
            }
            state.silently_canceled = false;
        }
        Ok(())
    }

    fn update_result(&self, is_error: bool, value: Value) {
        {
            let mut state = self.inner.borrow_mut();
            state.fired = true;
            state.result = value;
            state.had_error = is_error;
        }
        self.fire();
    }

    /// Appends a raw sequence entry: a success slot, a failure slot, and an
    /// optional scope.
    ///
    /// Returns this Deferred unchanged without appending when it is
    /// currently blocking another Deferred. If this Deferred has fired and
    /// is not blocked, the queue drains immediately so the new entry runs
    /// with the current result.
    pub fn add_callbacks(
        &self,
        on_success: Option<Handler>,
        on_failure: Option<Handler>,
        scope: Option<Value>,
    ) -> Deferred {
        let fired = {
            let mut state = self.inner.borrow_mut();
            if state.blocking {
                return self.clone();
            }
            state.queue.push(SequenceEntry {
                on_success,
                on_failure,
                scope,
            });
            state.fired
        };
        if fired {
            self.fire();
        }
        self.clone()
    }

    /// Appends a success handler.
    pub fn add_callback<F>(&self, f: F) -> Deferred
    where
        F: FnMut(Value) -> HandlerResult + 'static,
    {
        let mut f = f;
        self.add_callbacks(Some(Handler::new(move |value, _scope| f(value))), None, None)
    }

    /// Appends a success handler running in `scope`.
    pub fn add_callback_in<F>(&self, scope: Value, f: F) -> Deferred
    where
        F: FnMut(Value, &Value) -> HandlerResult + 'static,
    {
        self.add_callbacks(Some(Handler::new(f)), None, Some(scope))
    }

    /// Appends a failure handler.
    pub fn add_errback<F>(&self, f: F) -> Deferred
    where
        F: FnMut(Value) -> HandlerResult + 'static,
    {
        let mut f = f;
        self.add_callbacks(None, Some(Handler::new(move |value, _scope| f(value))), None)
    }

    /// Appends a failure handler running in `scope`.
    pub fn add_errback_in<F>(&self, scope: Value, f: F) -> Deferred
    where
        F: FnMut(Value, &Value) -> HandlerResult + 'static,
    {
        self.add_callbacks(None, Some(Handler::new(f)), Some(scope))
    }

    /// Appends one handler to both the success and failure slots.
    pub fn add_both<F>(&self, f: F) -> Deferred
    where
        F: FnMut(Value) -> HandlerResult + 'static,
    {
        let shared = Rc::new(RefCell::new(f));
        let success = Rc::clone(&shared);
        let failure = shared;
        self.add_callbacks(
            Some(Handler::new(move |value, _scope| {
                (&mut *success.borrow_mut())(value)
            })),
            Some(Handler::new(move |value, _scope| {
                (&mut *failure.borrow_mut())(value)
            })),
            None,
        )
    }

    /// Appends one handler to both slots, running in `scope`.
    pub fn add_both_in<F>(&self, scope: Value, f: F) -> Deferred
    where
        F: FnMut(Value, &Value) -> HandlerResult + 'static,
    {
        let shared = Rc::new(RefCell::new(f));
        let success = Rc::clone(&shared);
        let failure = shared;
        self.add_callbacks(
            Some(Handler::new(move |value, scope| {
                (&mut *success.borrow_mut())(value, scope)
            })),
            Some(Handler::new(move |value, scope| {
                (&mut *failure.borrow_mut())(value, scope)
            })),
            Some(scope),
        )
    }

    /// Feeds this Deferred's eventual outcome into `other` as its seed.
    ///
    /// Equivalent to adding a callback that resolves `other` and an errback
    /// that rejects it. This Deferred's own result is carried forward
    /// unchanged for handlers registered after the chain point.
    pub fn chain_deferred(&self, other: &Deferred) -> Deferred {
        let on_success = other.clone();
        let on_failure = other.clone();
        self.add_callbacks(
            Some(Handler::new(move |value, _scope| {
                on_success.resolve(value)?;
                Ok(Resolution::Value(Value::Undefined))
            })),
            Some(Handler::new(move |value, _scope| {
                on_failure.reject(value)?;
                Ok(Resolution::Value(Value::Undefined))
            })),
            None,
        )
    }

    /// Suspends this chain until `other` fires, without consuming `other`.
    ///
    /// The suspension observes `other` through a fresh branch, so handlers
    /// registered on `other` by anyone else are unaffected.
    pub fn await_deferred(&self, other: &Deferred) -> Deferred {
        let other = other.clone();
        self.add_callback(move |_value| Ok(Resolution::Deferred(other.branch(false))))
    }

    /// Creates an independent continuation chain seeded with this
    /// Deferred's eventual result.
    ///
    /// With `propagate_cancel`, canceling the branch participates in the
    /// parent's cancellation fan-in: the parent is canceled once every such
    /// branch has been canceled, and a deep cancel on any branch reaches
    /// the parent immediately.
    pub fn branch(&self, propagate_cancel: bool) -> Deferred {
        let reporter = self.reporter();
        let child = Deferred::new(&reporter);
        self.chain_deferred(&child);
        if propagate_cancel && !child.is_fired() {
            child.inner.borrow_mut().parent = Some(Rc::downgrade(&self.inner));
            self.inner.borrow_mut().branch_count += 1;
        }
        child
    }

    /// Cancels this Deferred.
    ///
    /// Before firing: the parent link is cleared first, then either the
    /// whole parent is canceled (`deep`) or the parent's branch counter is
    /// decremented, canceling it when no propagating branches remain. The
    /// cancel hook runs if one was supplied; otherwise the cancellation is
    /// silent, permitting one later re-fire. If the Deferred is still
    /// unfired afterwards, it fires with a cancellation error.
    ///
    /// After firing, cancellation is a no-op unless this Deferred is
    /// blocked on a nested Deferred, in which case the cancellation
    /// forwards to that nested Deferred.
    pub fn cancel(&self, deep: bool) {
        if !self.is_fired() {
            let parent = { self.inner.borrow_mut().parent.take() };
            if let Some(weak) = parent {
                if let Some(inner) = weak.upgrade() {
                    let parent = Deferred { inner };
                    if deep {
                        parent.cancel(true);
                    } else {
                        parent.branch_cancel();
                    }
                }
            }
            let hook = { self.inner.borrow_mut().on_cancel.take() };
            if let Some(hook) = hook {
                hook(self.clone());
            } else {
                self.inner.borrow_mut().silently_canceled = true;
            }
            if !self.is_fired() {
                let id = self.id();
                self.update_result(true, Value::error(DeferredError::canceled(id)));
            }
        } else {
            let nested = { self.inner.borrow().blocked_on.clone() };
            if let Some(nested) = nested {
                nested.cancel(false);
            }
        }
    }

    fn branch_cancel(&self) {
        let remaining = {
            let mut state = self.inner.borrow_mut();
            if state.branch_count > 0 {
                state.branch_count -= 1;
            }
            state.branch_count
        };
        if remaining == 0 {
            self.cancel(false);
        }
    }

    fn resume(&self, is_success: bool, value: Value) {
        {
            let mut state = self.inner.borrow_mut();
            state.blocked = false;
            state.blocked_on = None;
        }
        self.update_result(!is_success, value);
    }

    /// Drains the queue: runs handlers strictly FIFO until the queue is
    /// empty or the chain suspends on a nested Deferred.
    fn fire(&self) {
        if self.inner.borrow().draining {
            // A live drain loop picks up appended entries itself; never
            // restart it re-entrantly.
            return;
        }

        // A pending rethrow is obsolete once an errback exists to consume
        // the error.
        let unschedule = {
            let mut state = self.inner.borrow_mut();
            if state.fired && state.queue.has_failure_handler() {
                state
                    .rethrow
                    .take()
                    .map(|ticket| (state.reporter.clone(), ticket))
            } else {
                None
            }
        };
        if let Some((reporter, ticket)) = unschedule {
            reporter.unschedule_rethrow(ticket);
        }

        // Break the parent link on fire; a resolved branch must not keep
        // its parent's cancellation fan-in waiting.
        let parent = { self.inner.borrow_mut().parent.take() };
        if let Some(weak) = parent {
            if let Some(parent) = weak.upgrade() {
                let mut state = parent.borrow_mut();
                if state.branch_count > 0 {
                    state.branch_count -= 1;
                }
            }
        }

        self.inner.borrow_mut().draining = true;

        let mut newly_blocked: Option<Deferred> = None;
        let mut unhandled = false;

        loop {
            let (handler, scope, res) = {
                let mut state = self.inner.borrow_mut();
                if state.blocked || state.queue.is_empty() {
                    break;
                }
                let entry = match state.queue.pop() {
                    Some(entry) => entry,
                    None => break,
                };
                let scope = entry
                    .scope
                    .unwrap_or_else(|| state.default_scope.clone());
                let handler = if state.had_error {
                    entry.on_failure
                } else {
                    entry.on_success
                };
                (handler, scope, state.result.clone())
            };

            // An empty slot carries the result forward unchanged.
            let mut handler = match handler {
                Some(handler) => handler,
                None => continue,
            };

            match handler.call(res.clone(), &scope) {
                Ok(Resolution::Value(ret)) => {
                    if !ret.is_undefined() {
                        let mut state = self.inner.borrow_mut();
                        // Identity first, then error shape: returning the
                        // very value that came in preserves the error
                        // state, as does returning any error-shaped value.
                        state.had_error =
                            state.had_error && (ret.same(&res) || ret.is_error());
                        state.result = ret;
                    }
                }
                Ok(Resolution::Deferred(nested)) => {
                    let mut state = self.inner.borrow_mut();
                    state.blocked = true;
                    state.blocked_on = Some(nested.clone());
                    drop(state);
                    newly_blocked = Some(nested);
                }
                Err(mut error) => {
                    let mut state = self.inner.borrow_mut();
                    if error.origin.is_none() {
                        error.origin = Some(state.id);
                    }
                    state.result = Value::error(error);
                    state.had_error = true;
                    if !state.queue.has_failure_handler() {
                        unhandled = true;
                    }
                }
            }
        }

        self.inner.borrow_mut().draining = false;

        if let Some(nested) = newly_blocked {
            let resume_success = self.clone();
            let resume_failure = self.clone();
            nested.add_callbacks(
                Some(Handler::new(move |value, _scope| {
                    resume_success.resume(true, value);
                    Ok(Resolution::Value(Value::Undefined))
                })),
                Some(Handler::new(move |value, _scope| {
                    resume_failure.resume(false, value);
                    Ok(Resolution::Value(Value::Undefined))
                })),
                None,
            );
            nested.inner.borrow_mut().blocking = true;
        } else {
            // While a suspension is in effect the error propagates through
            // the nested chain instead of the rethrow channel.
            let schedule = {
                let mut state = self.inner.borrow_mut();
                if state.blocked {
                    None
                } else {
                    let canceled = state
                        .result
                        .as_error()
                        .map(|error| error.is_canceled())
                        .unwrap_or(false);
                    if state.result.is_error() && !canceled {
                        state.had_error = true;
                        unhandled = true;
                    }
                    if unhandled && state.result.is_error() && !canceled {
                        state
                            .result
                            .as_error()
                            .map(|error| (state.reporter.clone(), error.clone()))
                    } else {
                        None
                    }
                }
            };
            if let Some((reporter, error)) = schedule {
                let ticket = reporter.schedule_rethrow(error);
                self.inner.borrow_mut().rethrow = Some(ticket);
            }
        }
    }

    /// A Deferred that has already fired with `value`.
    pub fn succeed(reporter: &Reporter, value: Value) -> Deferred {
        let deferred = Deferred::new(reporter);
        deferred.update_result(false, value);
        deferred
    }

    /// A Deferred that has already fired with `error`.
    ///
    /// Like [`Deferred::reject`], a payload that is not error-shaped is
    /// wrapped first.
    pub fn fail(reporter: &Reporter, error: Value) -> Deferred {
        let deferred = Deferred::new(reporter);
        let error = deferred.wrap_rejection(error);
        deferred.update_result(true, error);
        deferred
    }

    /// A Deferred that has already been canceled.
    pub fn canceled(reporter: &Reporter) -> Deferred {
        let deferred = Deferred::new(reporter);
        deferred.cancel(false);
        deferred
    }

    /// Normalizes a plain value or a Deferred into one Deferred and
    /// attaches `f` to it.
    ///
    /// A plain value becomes a pre-fired Deferred; a pending Deferred is
    /// observed through a cancel-propagating branch so the source is not
    /// consumed.
    pub fn when<R, F>(reporter: &Reporter, value: R, f: F) -> Deferred
    where
        R: Into<Resolution>,
        F: FnMut(Value) -> HandlerResult + 'static,
    {
        match value.into() {
            Resolution::Value(value) => Deferred::succeed(reporter, value).add_callback(f),
            Resolution::Deferred(deferred) => deferred.branch(true).add_callback(f),
        }
    }

    /// [`Deferred::when`] with an explicit handler scope.
    pub fn when_in<R, F>(reporter: &Reporter, value: R, scope: Value, f: F) -> Deferred
    where
        R: Into<Resolution>,
        F: FnMut(Value, &Value) -> HandlerResult + 'static,
    {
        match value.into() {
            Resolution::Value(value) => {
                Deferred::succeed(reporter, value).add_callback_in(scope, f)
            }
            Resolution::Deferred(deferred) => deferred.branch(true).add_callback_in(scope, f),
        }
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.borrow();
        f.debug_struct("Deferred")
            .field("id", &state.id)
            .field("fired", &state.fired)
            .field("had_error", &state.had_error)
            .field("blocked", &state.blocked)
            .field("queued", &state.queue.len())
            .finish()
    }
}
