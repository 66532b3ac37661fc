//! Blocking and polling helpers for scheduler loops.

use crate::core::DagNodeEvent;

/// Indices of the events that have completed, in input order. Never blocks.
#[must_use]
pub fn ready_set(events: &[&dyn DagNodeEvent]) -> Vec<usize> {
    events
        .iter()
        .enumerate()
        .filter_map(|(idx, event)| event.is_complete().then_some(idx))
        .collect()
}

/// Block until every event has completed.
pub fn wait_all(events: &[&dyn DagNodeEvent]) {
    for event in events {
        event.wait();
    }
}
