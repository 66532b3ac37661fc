//! Tests for device identity and contexts

use accel_events::core::{BackendKind, Context, DeviceId};

#[test]
fn test_device_id_display_and_ordering() {
    let a = DeviceId::new(BackendKind::Hip, 0);
    let b = DeviceId::new(BackendKind::Hip, 1);
    assert_eq!(a.to_string(), "hip:0");
    assert!(a < b);
    assert!(a.same_backend(b));
    assert!(!a.same_backend(DeviceId::new(BackendKind::Cuda, 0)));
}

#[test]
fn test_device_id_serde() {
    let id = DeviceId::new(BackendKind::Host, 3);
    let json = serde_json::to_string(&id).unwrap();
    assert!(json.contains("\"host\""));
    let back: DeviceId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}

#[test]
fn test_context_membership() {
    let d0 = DeviceId::new(BackendKind::Host, 0);
    let ctx = Context::new(vec![d0]);
    assert!(ctx.contains(d0));
    assert!(!ctx.contains(DeviceId::new(BackendKind::Host, 1)));
    assert_ne!(ctx.id(), Context::new(vec![d0]).id());
}
