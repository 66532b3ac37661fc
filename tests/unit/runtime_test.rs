//! Tests for scheduler-facing wait helpers

use std::sync::Arc;
use std::time::Duration;

use accel_events::builders::build_host_runtime;
use accel_events::config::{EventRuntimeConfig, UnhandledErrorPolicy};
use accel_events::core::DagNodeEvent;
use accel_events::runtime::{ready_set, wait_all, wait_all_async, wait_async};

fn runtime() -> accel_events::builders::HostRuntime {
    let mut cfg = EventRuntimeConfig::default();
    cfg.unhandled_errors = UnhandledErrorPolicy::Panic;
    cfg.host.streams_per_device = 2;
    build_host_runtime(&cfg).unwrap()
}

#[test]
fn test_ready_set_tracks_host_streams() {
    let rt = runtime();
    let (gate_tx, gate_rx) = crossbeam_channel::bounded::<()>(0);
    rt.submit(0, 0, move || gate_rx.recv().map_err(|e| e.to_string()))
        .unwrap();
    let blocked = rt.record_event(0, 0).unwrap();
    let free = rt.record_event(0, 1).unwrap();
    free.wait();
    let events: [&dyn DagNodeEvent; 2] = [&blocked, &free];

    assert_eq!(ready_set(&events), vec![1]);
    gate_tx.send(()).unwrap();
    wait_all(&events);
    assert_eq!(ready_set(&events), vec![0, 1]);
    rt.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_wait_async_does_not_block_runtime() {
    let rt = runtime();
    rt.submit(0, 0, || {
        std::thread::sleep(Duration::from_millis(30));
        Ok(())
    })
    .unwrap();
    let event: Arc<dyn DagNodeEvent> = Arc::new(rt.record_event(0, 0).unwrap());

    // Another task keeps making progress while the event is pending.
    let ticker = tokio::spawn(async {
        tokio::time::sleep(Duration::from_millis(1)).await;
        7
    });
    wait_async(Arc::clone(&event)).await.unwrap();
    assert!(event.is_complete());
    assert_eq!(ticker.await.unwrap(), 7);
    rt.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_wait_all_async() {
    let rt = runtime();
    let events: Vec<Arc<dyn DagNodeEvent>> = (0..4)
        .map(|i| {
            rt.submit(0, i % 2, || Ok(())).unwrap();
            Arc::new(rt.record_event(0, i % 2).unwrap()) as Arc<dyn DagNodeEvent>
        })
        .collect();
    wait_all_async(events.clone()).await.unwrap();
    assert!(events.iter().all(|e| e.is_complete()));
    rt.shutdown();
}

#[tokio::test]
async fn test_wait_async_completed_fast_path() {
    let rt = runtime();
    let event = rt.record_event(0, 0).unwrap();
    event.wait();
    let futures = vec![wait_async(Arc::new(event))];
    for result in futures::future::join_all(futures).await {
        result.unwrap();
    }
    rt.shutdown();
}
