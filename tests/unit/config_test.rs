//! Tests for configuration validation

use accel_events::config::{EventRuntimeConfig, HostBackendConfig, UnhandledErrorPolicy};

#[test]
fn test_default_config_is_valid() {
    let cfg = EventRuntimeConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.unhandled_errors, UnhandledErrorPolicy::Abort);
}

#[test]
fn test_host_config_invalid_streams() {
    let cfg = HostBackendConfig::new().with_streams_per_device(0);
    assert!(cfg.validate().is_err());
}

#[test]
fn test_host_config_invalid_depth() {
    let cfg = HostBackendConfig::new().with_max_stream_depth(0);
    assert!(cfg.validate().is_err());
}

#[test]
fn test_host_config_small_stack() {
    let cfg = HostBackendConfig::new().with_thread_stack_size(1024);
    let err = cfg.validate().unwrap_err();
    assert!(err.contains("thread_stack_size"));
}

#[test]
fn test_runtime_config_from_json() {
    let json = r#"{
        "unhandled_errors": "panic",
        "host": { "device_count": 2, "streams_per_device": 4 }
    }"#;
    let cfg = EventRuntimeConfig::from_json_str(json).unwrap();
    assert_eq!(cfg.unhandled_errors, UnhandledErrorPolicy::Panic);
    assert_eq!(cfg.host.device_count, 2);
    assert_eq!(cfg.host.streams_per_device, 4);
    assert_eq!(cfg.host.max_stream_depth, HostBackendConfig::default().max_stream_depth);
}

#[test]
fn test_runtime_config_from_json_rejects_invalid() {
    let err = EventRuntimeConfig::from_json_str(r#"{ "host": { "device_count": 0 } }"#).unwrap_err();
    assert!(err.contains("device_count"));
    assert!(EventRuntimeConfig::from_json_str("not json").is_err());
}

#[test]
fn test_runtime_config_from_lookup() {
    let cfg = EventRuntimeConfig::from_lookup(|key| match key {
        "ACCEL_EVENTS_UNHANDLED_ERRORS" => Some("panic".into()),
        "ACCEL_EVENTS_HOST_DEVICES" => Some("3".into()),
        _ => None,
    })
    .unwrap();
    assert_eq!(cfg.unhandled_errors, UnhandledErrorPolicy::Panic);
    assert_eq!(cfg.host.device_count, 3);
}

#[test]
fn test_runtime_config_from_lookup_bad_number() {
    let err = EventRuntimeConfig::from_lookup(|key| {
        (key == "ACCEL_EVENTS_HOST_STREAMS").then(|| "many".to_string())
    })
    .unwrap_err();
    assert!(err.contains("ACCEL_EVENTS_HOST_STREAMS"));
}
