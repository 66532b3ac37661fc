//! Error types for backend primitives and event bookkeeping.

use thiserror::Error;
use uuid::Uuid;

use super::device::DeviceId;

/// Failures reported by a backend's native completion primitives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The backend could not allocate a completion token.
    #[error("failed to create completion token: {0}")]
    TokenCreation(String),
    /// A non-blocking status query failed (distinct from "not yet complete").
    #[error("completion query failed: {0}")]
    Query(String),
    /// A blocking synchronization call failed.
    #[error("synchronization failed: {0}")]
    Synchronize(String),
    /// Work enqueued ahead of the token failed on the device.
    #[error("stream error: {0}")]
    Stream(String),
    /// The token was already recorded into a stream.
    #[error("token has already been recorded")]
    AlreadyRecorded,
    /// The instruction stream no longer accepts work.
    #[error("stream is closed")]
    StreamClosed,
    /// The token was allocated by a different backend instance than the stream.
    #[error("token belongs to a different backend instance")]
    BackendMismatch,
    /// A native API call returned a failure code.
    #[error("{api} returned {code}: {message}")]
    Native {
        /// Native entry point that failed.
        api: &'static str,
        /// Raw status code.
        code: i32,
        /// Backend diagnostic text.
        message: String,
    },
}

/// Errors produced by the DAG-facing event layer and its builders.
#[derive(Debug, Error)]
pub enum EventError {
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The requested device does not exist.
    #[error("unknown device: {0}")]
    UnknownDevice(DeviceId),
    /// The requested stream does not exist on the device.
    #[error("device {device} has no stream {stream}")]
    UnknownStream {
        /// Device that was addressed.
        device: DeviceId,
        /// Stream index that was requested.
        stream: usize,
    },
    /// The node has not been given a completion event yet.
    #[error("node {0} has not been submitted")]
    NotSubmitted(Uuid),
    /// The node already carries a completion event.
    #[error("node {0} already has a completion event")]
    AlreadySubmitted(Uuid),
    /// The event was recorded on a different device than the node runs on.
    #[error("device mismatch: node runs on {expected}, event belongs to {actual}")]
    DeviceMismatch {
        /// Device the node was assigned to.
        expected: DeviceId,
        /// Device the event reports.
        actual: DeviceId,
    },
    /// Backend primitive failure.
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// Internal failure (worker panic, join error, etc.).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
