//! Aggregate Deferreds over collections of member Deferreds.
//!
//! A [`DeferredList`] owns a plain aggregate Deferred that fires based on
//! what its members do: by default once all of them have fired, or on the
//! first success / first error when configured to.

use deferred_types::Value;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::deferred::Deferred;
use crate::reporter::Reporter;
use crate::sequence::{Handler, Resolution};

/// Firing policy for a [`DeferredList`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DeferredListOptions {
    /// Fire the aggregate on the first member success, with a
    /// `[index, value]` pair as the result.
    pub fire_on_one_success: bool,
    /// Fire the aggregate on the first member error, propagating that
    /// error.
    pub fire_on_one_error: bool,
    /// Replace member errors with `Null` downstream of the observation
    /// point after recording them, so they do not surface twice.
    pub consume_errors: bool,
}

struct ListState {
    aggregate: Deferred,
    results: RefCell<Vec<Option<(bool, Value)>>>,
    finished: Cell<usize>,
    total: usize,
    options: DeferredListOptions,
}

impl ListState {
    fn record(&self, index: usize, success: bool, value: &Value) {
        self.finished.set(self.finished.get() + 1);
        self.results.borrow_mut()[index] = Some((success, value.clone()));
        if !self.aggregate.is_fired() {
            if self.options.fire_on_one_success && success {
                let _ = self.aggregate.resolve(Value::list(vec![
                    Value::Smi(index as i32),
                    value.clone(),
                ]));
            } else if self.options.fire_on_one_error && !success {
                let _ = self.aggregate.reject(value.clone());
            } else if self.finished.get() == self.total {
                let _ = self.aggregate.resolve(self.collect());
            }
        }
    }

    fn collect(&self) -> Value {
        let items = self
            .results
            .borrow()
            .iter()
            .map(|slot| match slot {
                Some((success, value)) => {
                    Value::list(vec![Value::Boolean(*success), value.clone()])
                }
                None => Value::Undefined,
            })
            .collect();
        Value::list(items)
    }
}

/// An aggregate Deferred over a set of member Deferreds.
///
/// The default result is a list of `[Boolean(success), value]` pairs in
/// member order.
///
/// # Examples
///
/// ```
/// use deferred_runtime::{Deferred, DeferredList, DeferredListOptions, Reporter};
/// use deferred_types::Value;
///
/// let reporter = Reporter::new();
/// let a = Deferred::new(&reporter);
/// let b = Deferred::new(&reporter);
/// let list = DeferredList::new(
///     &reporter,
///     vec![a.clone(), b.clone()],
///     DeferredListOptions::default(),
/// );
///
/// a.resolve(Value::Smi(1)).unwrap();
/// assert!(!list.deferred().is_fired());
/// b.resolve(Value::Smi(2)).unwrap();
/// assert!(list.deferred().is_fired());
/// ```
pub struct DeferredList {
    state: Rc<ListState>,
}

impl DeferredList {
    /// Observes `members` and builds the aggregate Deferred.
    ///
    /// An empty member list (without `fire_on_one_success`) fires
    /// immediately with an empty list.
    pub fn new(
        reporter: &Reporter,
        members: Vec<Deferred>,
        options: DeferredListOptions,
    ) -> Self {
        let state = Rc::new(ListState {
            aggregate: Deferred::new(reporter),
            results: RefCell::new(vec![None; members.len()]),
            finished: Cell::new(0),
            total: members.len(),
            options,
        });

        for (index, member) in members.iter().enumerate() {
            let on_success = Rc::clone(&state);
            let on_failure = Rc::clone(&state);
            member.add_callbacks(
                Some(Handler::new(move |value, _scope| {
                    on_success.record(index, true, &value);
                    Ok(Resolution::Value(Value::Undefined))
                })),
                Some(Handler::new(move |value, _scope| {
                    on_failure.record(index, false, &value);
                    if on_failure.options.consume_errors {
                        Ok(Resolution::Value(Value::Null))
                    } else {
                        Ok(Resolution::Value(Value::Undefined))
                    }
                })),
                None,
            );
        }

        if members.is_empty() && !options.fire_on_one_success {
            let _ = state.aggregate.resolve(Value::list(Vec::new()));
        }

        DeferredList { state }
    }

    /// The aggregate Deferred to chain on.
    pub fn deferred(&self) -> &Deferred {
        &self.state.aggregate
    }

    /// Consumes the list, returning the aggregate Deferred.
    pub fn into_deferred(self) -> Deferred {
        self.state.aggregate.clone()
    }
}

/// Fires with a plain list of member values once every member has
/// succeeded; fires with the first member error otherwise.
pub fn gather_results(reporter: &Reporter, members: Vec<Deferred>) -> Deferred {
    let list = DeferredList::new(
        reporter,
        members,
        DeferredListOptions {
            fire_on_one_error: true,
            ..DeferredListOptions::default()
        },
    );
    list.into_deferred().add_callback(|value| {
        let unwrapped = match &value {
            Value::List(pairs) => Value::list(
                pairs
                    .iter()
                    .map(|pair| match pair {
                        Value::List(entry) => {
                            entry.get(1).cloned().unwrap_or(Value::Undefined)
                        }
                        other => other.clone(),
                    })
                    .collect(),
            ),
            other => other.clone(),
        };
        Ok(Resolution::Value(unwrapped))
    })
}
