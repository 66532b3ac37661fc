//! Tests for builder modules

use accel_events::builders::build_host_runtime;
use accel_events::config::{EventRuntimeConfig, HostBackendConfig, UnhandledErrorPolicy};
use accel_events::core::{BackendKind, DagNodeEvent, EventError};

fn config(devices: u32, streams: usize) -> EventRuntimeConfig {
    EventRuntimeConfig {
        unhandled_errors: UnhandledErrorPolicy::Panic,
        host: HostBackendConfig::new()
            .with_device_count(devices)
            .with_streams_per_device(streams),
    }
}

#[test]
fn test_host_runtime_device_ids() {
    let rt = build_host_runtime(&config(3, 1)).unwrap();
    let ids: Vec<_> = rt.devices().iter().map(|d| d.id()).collect();
    assert_eq!(ids.len(), 3);
    for (idx, id) in ids.iter().enumerate() {
        assert_eq!(id.backend(), BackendKind::Host);
        assert_eq!(id.index() as usize, idx);
        assert!(rt.context().contains(*id));
    }
    rt.shutdown();
}

#[test]
fn test_host_runtime_events_on_each_stream() {
    let rt = build_host_runtime(&config(1, 2)).unwrap();
    let a = rt.record_event(0, 0).unwrap();
    let b = rt.record_event(0, 1).unwrap();
    a.wait();
    b.wait();
    assert!(a.is_complete() && b.is_complete());
    rt.shutdown();
}

#[test]
fn test_host_runtime_rejects_work_after_shutdown() {
    let rt = build_host_runtime(&config(1, 1)).unwrap();
    rt.shutdown();
    let err = rt.submit(0, 0, || Ok(())).unwrap_err();
    assert!(matches!(err, EventError::Backend(_)));
    assert!(rt.record_event(0, 0).is_err());
    // Tokens of the failed recording were released.
    assert_eq!(rt.device(0).unwrap().backend().stats().live, 0);
}
