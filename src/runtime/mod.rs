//! Scheduler-facing helpers over sets of completion events.

pub mod wait;
#[cfg(feature = "tokio-runtime")]
pub mod tokio_wait;

pub use wait::{ready_set, wait_all};
#[cfg(feature = "tokio-runtime")]
pub use tokio_wait::{wait_all_async, wait_async};
