//! Tests for error types

use accel_events::core::{BackendError, BackendKind, DeviceId, EventError};
use uuid::Uuid;

#[test]
fn test_token_creation_error() {
    let err = BackendError::TokenCreation("out of handles".to_string());
    assert_eq!(format!("{}", err), "failed to create completion token: out of handles");
}

#[test]
fn test_stream_error() {
    let err = BackendError::Stream("illegal address".to_string());
    assert_eq!(format!("{}", err), "stream error: illegal address");
}

#[test]
fn test_already_recorded_error() {
    assert_eq!(
        format!("{}", BackendError::AlreadyRecorded),
        "token has already been recorded"
    );
}

#[test]
fn test_unknown_stream_error() {
    let err = EventError::UnknownStream {
        device: DeviceId::new(BackendKind::Host, 2),
        stream: 5,
    };
    assert_eq!(format!("{}", err), "device host:2 has no stream 5");
}

#[test]
fn test_not_submitted_error() {
    let id = Uuid::nil();
    let err = EventError::NotSubmitted(id);
    assert_eq!(format!("{}", err), format!("node {id} has not been submitted"));
}

#[test]
fn test_backend_error_into_anyhow() {
    fn fails() -> accel_events::core::AppResult<()> {
        Err(EventError::from(BackendError::StreamClosed))?;
        Ok(())
    }
    let err = fails().unwrap_err();
    assert_eq!(err.to_string(), "stream is closed");
    assert!(matches!(
        err.downcast_ref::<EventError>(),
        Some(EventError::Backend(BackendError::StreamClosed))
    ));
}
