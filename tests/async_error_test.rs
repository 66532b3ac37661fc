//! Integration tests for asynchronous error delivery
//!
//! - Failures reach the handler in detection order, exactly once
//! - Flushing with nothing reported never calls the handler
//! - Device failures observed by completion events are routed to the handler
//! - Without a handler the configured policy fires, aborting by default

use std::process::{Command, Output};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use accel_events::builders::build_host_runtime;
use accel_events::config::{EventRuntimeConfig, UnhandledErrorPolicy};
use accel_events::core::{AsyncErrorQueue, DagNodeEvent, Errc, Exception, ExceptionList};
use parking_lot::Mutex;

/// Set in a re-executed copy of this test binary to select the child side.
const CHILD_ENV: &str = "ACCEL_EVENTS_FLUSH_CHILD";
/// Printed by the child once `flush()` has returned.
const FLUSH_RETURNED: &str = "flush returned";

/// Re-run a single test of this binary as a child process with `mode` set.
fn run_child(test_name: &str, mode: &str) -> Output {
    let exe = std::env::current_exe().expect("test binary path");
    Command::new(exe)
        .args([test_name, "--exact", "--nocapture", "--test-threads=1"])
        .env(CHILD_ENV, mode)
        .output()
        .expect("spawn child test process")
}

fn child_mode() -> Option<String> {
    std::env::var(CHILD_ENV).ok()
}

fn collecting(queue: &AsyncErrorQueue) -> (Arc<Mutex<Vec<ExceptionList>>>, Arc<AtomicUsize>) {
    let batches = Arc::new(Mutex::new(Vec::new()));
    let calls = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&batches);
    let counter = Arc::clone(&calls);
    queue.register_handler(move |list| {
        counter.fetch_add(1, Ordering::SeqCst);
        sink.lock().push(list);
    });
    (batches, calls)
}

#[test]
fn test_failures_delivered_in_order_once() {
    let queue = AsyncErrorQueue::with_policy(UnhandledErrorPolicy::Panic);
    let (batches, calls) = collecting(&queue);

    queue.report(Exception::with_message(Errc::Kernel, "F1"));
    queue.report(Exception::with_message(Errc::MemoryAllocation, "F2"));
    queue.report(Exception::with_message(Errc::Event, "F3"));
    assert_eq!(queue.pending(), 3);

    queue.flush();
    queue.flush();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let batches = batches.lock();
    let messages: Vec<_> = batches[0].iter().map(|e| e.what().to_string()).collect();
    assert_eq!(messages, ["F1", "F2", "F3"]);
    assert_eq!(queue.pending(), 0);
}

#[test]
fn test_empty_flush_skips_handler() {
    let queue = AsyncErrorQueue::new();
    let (_, calls) = collecting(&queue);
    queue.flush();
    queue.flush();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_empty_flush_without_handler_is_silent() {
    // Abort policy, but nothing to deliver.
    AsyncErrorQueue::new().flush();
}

#[test]
fn test_reports_from_many_threads() {
    let queue = AsyncErrorQueue::with_policy(UnhandledErrorPolicy::Panic);
    let (batches, _) = collecting(&queue);

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let queue = queue.clone();
            std::thread::spawn(move || {
                for i in 0..25 {
                    queue.report(Exception::with_message(Errc::Runtime, format!("{t}-{i}")));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    queue.flush();

    let batches = batches.lock();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 100);
    // Per-thread order is preserved.
    for t in 0..4 {
        let prefix = format!("{t}-");
        let seq: Vec<usize> = batches[0]
            .iter()
            .filter_map(|e| e.what().strip_prefix(&prefix))
            .map(|n| n.parse().unwrap())
            .collect();
        assert_eq!(seq, (0..25).collect::<Vec<_>>());
    }
}

#[test]
fn test_device_failure_routed_through_event() {
    let mut cfg = EventRuntimeConfig::default();
    cfg.unhandled_errors = UnhandledErrorPolicy::Panic;
    let rt = build_host_runtime(&cfg).unwrap();
    let (batches, calls) = collecting(rt.errors());

    rt.submit(0, 0, || Err("illegal address".to_string())).unwrap();
    let event = rt.record_event(0, 0).unwrap();
    event.wait();
    assert!(!event.is_complete());
    assert!(!event.is_complete());

    rt.errors().flush();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    {
        let batches = batches.lock();
        let list = &batches[0];
        assert_eq!(list.len(), 1);
        let ex = list.iter().next().unwrap();
        assert_eq!(ex.code().errc(), Some(Errc::Event));
        assert!(ex.what().contains("illegal address"));
        assert!(ex.what().contains("host:0"));
        assert_eq!(ex.context().map(|c| c.id()), Some(rt.context().id()));
    }

    // Reported once per event, however often it is polled.
    event.wait();
    rt.errors().flush();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    rt.shutdown();
}

#[test]
fn test_handler_may_flush_again() {
    let queue = AsyncErrorQueue::with_policy(UnhandledErrorPolicy::Panic);
    let inner = queue.clone();
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    queue.register_handler(move |list| {
        counter.fetch_add(list.len(), Ordering::SeqCst);
        inner.flush();
    });
    queue.report(Exception::new(Errc::Build));
    queue.flush();
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[test]
#[should_panic(expected = "unhandled asynchronous errors")]
fn test_unhandled_failure_panics_under_panic_policy() {
    let queue = AsyncErrorQueue::with_policy(UnhandledErrorPolicy::Panic);
    queue.report(Exception::with_message(Errc::Kernel, "kernel fault"));
    queue.flush();
}

#[test]
fn test_unhandled_failure_aborts_by_default() {
    if child_mode().as_deref() == Some("abort") {
        let queue = AsyncErrorQueue::new();
        queue.report(Exception::new(Errc::Event));
        queue.flush();
        println!("{FLUSH_RETURNED}");
        return;
    }

    let output = run_child("test_unhandled_failure_aborts_by_default", "abort");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!output.status.success(), "child exited cleanly: {:?}", output.status);
    assert!(!stdout.contains(FLUSH_RETURNED));
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        // SIGABRT
        assert_eq!(output.status.signal(), Some(6));
    }
}

#[test]
fn test_empty_flush_without_handler_exits_cleanly() {
    if child_mode().as_deref() == Some("empty") {
        let queue = AsyncErrorQueue::new();
        queue.flush();
        println!("{FLUSH_RETURNED}");
        return;
    }

    let output = run_child("test_empty_flush_without_handler_exits_cleanly", "empty");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "child failed: {:?}", output.status);
    assert!(stdout.contains(FLUSH_RETURNED));
}
