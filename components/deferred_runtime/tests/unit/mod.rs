//! Unit tests for the deferred runtime

use deferred_runtime::{CaptureSink, Reporter, TimerQueue};
use std::cell::RefCell;
use std::rc::Rc;


/// Builds a reporter around a drivable clock and a capturing sink.
///
/// Returns the reporter, the timer queue driving its grace windows, and the
/// buffer the capture sink writes into.
pub fn test_reporter() -> (Reporter, Rc<TimerQueue>, Rc<RefCell<Vec<String>>>) {
    let timers = Rc::new(TimerQueue::new());
    let output = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::new(CaptureSink::new_with_output(output.clone()));
    (
        Reporter::with_parts(timers.clone(), sink, 0),
        timers,
        output,
    )
}
