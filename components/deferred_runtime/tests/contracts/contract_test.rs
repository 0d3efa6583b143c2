//! Contract tests for deferred_runtime component
//!
//! These tests verify that the component satisfies the API contracts of
//! the asynchronous-result primitive: operation signatures, return types,
//! and the shapes of the supporting capability traits.

use deferred_runtime::{
    CaptureSink, Deferred, DeferredList, DeferredListOptions, ErrorSink, Handler, Reporter,
    Resolution, ScheduleId, Scheduler, SequenceEntry, SequenceQueue, TimerQueue,
};
use deferred_types::{DeferredError, DeferredId, Value};
use std::rc::Rc;

mod deferred_contract {
    use super::*;

    #[test]
    fn new_returns_a_pending_deferred() {
        let reporter = Reporter::new();
        let deferred = Deferred::new(&reporter);
        assert!(!deferred.is_fired());
    }

    #[test]
    fn resolve_takes_value_and_returns_result() {
        let reporter = Reporter::new();
        let deferred = Deferred::new(&reporter);
        let result: Result<(), DeferredError> = deferred.resolve(Value::Smi(1));
        assert!(result.is_ok());
    }

    #[test]
    fn reject_takes_value_and_returns_result() {
        let reporter = Reporter::new();
        let deferred = Deferred::new(&reporter);
        deferred.add_errback(|value| Ok(Resolution::Value(value)));
        let result: Result<(), DeferredError> = deferred.reject(Value::Null);
        assert!(result.is_ok());
    }

    #[test]
    fn handler_registration_returns_the_deferred() {
        let reporter = Reporter::new();
        let deferred = Deferred::new(&reporter);
        let chained: Deferred = deferred
            .add_callback(|value| Ok(Resolution::Value(value)))
            .add_errback(|value| Ok(Resolution::Value(value)))
            .add_both(|value| Ok(Resolution::Value(value)));
        assert_eq!(chained.id(), deferred.id());
    }

    #[test]
    fn chain_deferred_returns_self() {
        let reporter = Reporter::new();
        let deferred = Deferred::new(&reporter);
        let other = Deferred::new(&reporter);
        let returned: Deferred = deferred.chain_deferred(&other);
        assert_eq!(returned.id(), deferred.id());
    }

    #[test]
    fn await_deferred_returns_self() {
        let reporter = Reporter::new();
        let deferred = Deferred::new(&reporter);
        let other = Deferred::new(&reporter);
        let returned: Deferred = deferred.await_deferred(&other);
        assert_eq!(returned.id(), deferred.id());
    }

    #[test]
    fn branch_returns_a_new_deferred() {
        let reporter = Reporter::new();
        let deferred = Deferred::new(&reporter);
        let branch: Deferred = deferred.branch(false);
        assert_ne!(branch.id(), deferred.id());
    }

    #[test]
    fn is_fired_is_a_pure_predicate() {
        let reporter = Reporter::new();
        let deferred = Deferred::new(&reporter);
        let _fired: bool = deferred.is_fired();
        let _fired_again: bool = deferred.is_fired();
        assert!(!deferred.is_fired());
    }

    #[test]
    fn ids_identify_deferreds() {
        let reporter = Reporter::new();
        let a: DeferredId = Deferred::new(&reporter).id();
        let b: DeferredId = Deferred::new(&reporter).id();
        assert_ne!(a, b);
    }

    #[test]
    fn scoped_registration_variants_accept_scopes() {
        let reporter = Reporter::new();
        let deferred = Deferred::with_canceler_and_scope(&reporter, |_canceled| {}, Value::Null);
        deferred
            .add_callback_in(Value::Null, |value, _scope| Ok(Resolution::Value(value)))
            .add_errback_in(Value::Null, |value, _scope| Ok(Resolution::Value(value)))
            .add_both_in(Value::Null, |value, _scope| Ok(Resolution::Value(value)));
        assert!(!deferred.is_fired());
    }
}

mod factories_contract {
    use super::*;

    #[test]
    fn succeed_is_prefired() {
        let reporter = Reporter::new();
        let deferred: Deferred = Deferred::succeed(&reporter, Value::Smi(1));
        assert!(deferred.is_fired());
        assert!(!deferred.had_error());
    }

    #[test]
    fn fail_is_prefired_with_error() {
        let reporter = Reporter::new();
        let deferred: Deferred = Deferred::fail(&reporter, Value::Null);
        deferred.add_errback(|value| Ok(Resolution::Value(value)));
        assert!(deferred.is_fired());
        assert!(deferred.had_error());
    }

    #[test]
    fn canceled_is_prefired_with_cancellation() {
        let reporter = Reporter::new();
        let deferred: Deferred = Deferred::canceled(&reporter);
        assert!(deferred.is_fired());
        assert!(deferred
            .result()
            .as_error()
            .map(|e| e.is_canceled())
            .unwrap_or(false));
    }

    #[test]
    fn when_accepts_values_and_deferreds() {
        let reporter = Reporter::new();
        let from_value: Deferred =
            Deferred::when(&reporter, Value::Smi(1), |value| Ok(Resolution::Value(value)));
        assert!(from_value.is_fired());

        let source = Deferred::new(&reporter);
        let from_deferred: Deferred =
            Deferred::when(&reporter, source, |value| Ok(Resolution::Value(value)));
        assert!(!from_deferred.is_fired());
    }

    #[test]
    fn when_in_runs_the_handler_with_the_scope() {
        let reporter = Reporter::new();
        let result = Deferred::when_in(
            &reporter,
            Value::Smi(2),
            Value::String("ctx".to_string()),
            |value, scope| {
                assert_eq!(*scope, Value::String("ctx".to_string()));
                Ok(Resolution::Value(value))
            },
        );
        assert!(result.is_fired());
        assert_eq!(result.result(), Value::Smi(2));
    }
}

mod sequence_contract {
    use super::*;

    #[test]
    fn queue_stores_entries_in_order() {
        let mut queue = SequenceQueue::new();
        queue.push(SequenceEntry {
            on_success: Some(Handler::new(|value, _scope| Ok(Resolution::Value(value)))),
            on_failure: None,
            scope: Some(Value::Null),
        });
        assert_eq!(queue.len(), 1);
        let entry = queue.pop().unwrap();
        assert!(entry.on_success.is_some());
        assert!(entry.on_failure.is_none());
        assert_eq!(entry.scope, Some(Value::Null));
    }

    #[test]
    fn handler_call_returns_a_handler_result() {
        let mut handler = Handler::new(|value, _scope| Ok(Resolution::Value(value)));
        let result = handler.call(Value::Smi(1), &Value::Undefined);
        assert!(result.is_ok());
    }
}

mod scheduler_contract {
    use super::*;

    #[test]
    fn schedule_returns_a_cancelable_ticket() {
        let timers = TimerQueue::new();
        let ticket: ScheduleId = timers.schedule(5, Box::new(|| {}));
        timers.cancel(ticket);
        assert_eq!(timers.pending(), 0);
    }

    #[test]
    fn timer_queue_is_a_scheduler() {
        let timers: Rc<dyn Scheduler> = Rc::new(TimerQueue::new());
        let ticket = timers.schedule(1, Box::new(|| {}));
        timers.cancel(ticket);
    }

    #[test]
    fn advance_reports_jobs_run() {
        let timers = TimerQueue::new();
        timers.schedule(1, Box::new(|| {}));
        let run: usize = timers.advance(5);
        assert_eq!(run, 1);
    }
}

mod reporter_contract {
    use super::*;

    #[test]
    fn reporter_is_built_from_injected_parts() {
        let timers = Rc::new(TimerQueue::new());
        let sink = Rc::new(CaptureSink::new());
        let reporter = Reporter::with_parts(timers, sink, 25);
        assert_eq!(reporter.grace_ms(), 25);
    }

    #[test]
    fn capture_sink_is_an_error_sink() {
        let sink: Rc<dyn ErrorSink> = Rc::new(CaptureSink::new());
        sink.report(&DeferredError::application("probe"));
    }

    #[test]
    fn reporters_clone_cheaply() {
        let reporter = Reporter::new();
        let clone = reporter.clone();
        assert_eq!(reporter.grace_ms(), clone.grace_ms());
    }
}

mod list_contract {
    use super::*;

    #[test]
    fn list_exposes_its_aggregate_deferred() {
        let reporter = Reporter::new();
        let list = DeferredList::new(&reporter, Vec::new(), DeferredListOptions::default());
        let aggregate: &Deferred = list.deferred();
        assert!(aggregate.is_fired());
        let owned: Deferred = list.into_deferred();
        assert!(owned.is_fired());
    }

    #[test]
    fn options_default_to_fire_when_all_fire() {
        let options = DeferredListOptions::default();
        assert!(!options.fire_on_one_success);
        assert!(!options.fire_on_one_error);
        assert!(!options.consume_errors);
    }
}
