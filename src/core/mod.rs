//! Completion events, native token ownership and the asynchronous error channel.

pub mod async_error;
pub mod dag;
pub mod device;
pub mod error;
pub mod event;
pub mod token;

pub use async_error::{
    AsyncErrorQueue, AsyncHandler, Errc, ErrorCategory, ErrorCode, Exception, ExceptionList,
    SYCL_CATEGORY,
};
pub use dag::DagNode;
pub use device::{BackendKind, Context, DeviceId};
pub use error::{AppResult, BackendError, EventError};
pub use event::{BackendEvent, DagNodeEvent};
pub use token::{make_event, NativeBackend, QueryStatus, UniqueToken};
