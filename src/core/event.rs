//! Completion events: the uniform "is this done yet" signal of a DAG node.
//!
//! [`DagNodeEvent`] is the only thing the scheduler sees. [`BackendEvent`]
//! implements it once for every [`NativeBackend`], so the native query and
//! synchronize calls are statically dispatched inside the event while the
//! scheduler stays backend-agnostic behind `dyn DagNodeEvent`.
//!
//! # State
//!
//! An event is either *pending* or *complete*. Completion is latched in an
//! atomic the first time the backend confirms it, so `is_complete()` never
//! flips back to `false` and later polls skip the backend entirely. Backend
//! failures are not a state: they are reported once through the
//! [`AsyncErrorQueue`] and the event stays pending.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{trace, warn};

use super::async_error::{AsyncErrorQueue, Errc, Exception};
use super::device::DeviceId;
use super::error::BackendError;
use super::token::{NativeBackend, QueryStatus, UniqueToken};

/// Completion signal of one previously submitted unit of device work.
///
/// All methods take `&self` and may be called from any number of threads at
/// once. The owner must make sure no call is in flight when the event is
/// dropped.
pub trait DagNodeEvent: Send + Sync + fmt::Debug {
    /// Non-blocking completion poll. Once `true`, always `true`.
    fn is_complete(&self) -> bool;

    /// Block until the device reports completion. Afterwards
    /// [`is_complete`](Self::is_complete) returns `true`, unless the backend
    /// reported a failure for the work.
    fn wait(&self);

    /// Device the work was submitted to.
    fn device(&self) -> DeviceId;
}

/// [`DagNodeEvent`] over one native token of backend `B`.
pub struct BackendEvent<B: NativeBackend> {
    device: DeviceId,
    token: UniqueToken<B>,
    complete: AtomicBool,
    failure_reported: AtomicBool,
    errors: AsyncErrorQueue,
}

impl<B: NativeBackend> BackendEvent<B> {
    /// Wrap a token that has already been recorded into a live stream.
    ///
    /// Constructing an event over an unrecorded token is a caller bug; the
    /// backend may treat the first query or wait on it as a contract
    /// violation.
    #[must_use]
    pub fn new(device: DeviceId, token: UniqueToken<B>, errors: AsyncErrorQueue) -> Self {
        debug_assert_eq!(
            device.backend(),
            token.backend().kind(),
            "event device and token backend disagree"
        );
        Self {
            device,
            token,
            complete: AtomicBool::new(false),
            failure_reported: AtomicBool::new(false),
            errors,
        }
    }

    /// Native handle, e.g. for inserting a cross-stream wait.
    #[must_use]
    pub fn native(&self) -> B::Token {
        self.token.raw()
    }

    /// The owned token.
    #[must_use]
    pub const fn token(&self) -> &UniqueToken<B> {
        &self.token
    }

    fn latch(&self) {
        self.complete.store(true, Ordering::Release);
    }

    fn report_failure(&self, operation: &'static str, err: &BackendError) {
        // One report per event; a sticky device error would otherwise be
        // reported on every poll of a scheduler loop.
        if self.failure_reported.swap(true, Ordering::AcqRel) {
            return;
        }
        warn!(device = %self.device, operation, error = %err, "completion event failed");
        self.errors.report(Exception::with_message(
            Errc::Event,
            format!("{operation} on {} failed: {err}", self.device),
        ));
    }
}

impl<B: NativeBackend> DagNodeEvent for BackendEvent<B> {
    fn is_complete(&self) -> bool {
        if self.complete.load(Ordering::Acquire) {
            return true;
        }
        match self.token.backend().query(self.token.raw()) {
            Ok(QueryStatus::Complete) => {
                self.latch();
                true
            }
            Ok(QueryStatus::NotReady) => false,
            Err(err) => {
                self.report_failure("completion query", &err);
                false
            }
        }
    }

    fn wait(&self) {
        if self.complete.load(Ordering::Acquire) {
            return;
        }
        trace!(device = %self.device, token = ?self.token.raw(), "waiting on completion event");
        match self.token.backend().synchronize(self.token.raw()) {
            Ok(()) => self.latch(),
            Err(err) => self.report_failure("synchronize", &err),
        }
    }

    fn device(&self) -> DeviceId {
        self.device
    }
}

impl<B: NativeBackend> fmt::Debug for BackendEvent<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendEvent")
            .field("device", &self.device)
            .field("token", &self.token.raw())
            .field("complete", &self.complete.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
