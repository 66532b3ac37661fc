//! Native completion tokens and their scoped ownership.
//!
//! Every backend exposes some opaque handle that marks a point in an
//! asynchronous instruction stream (a `hipEvent_t`, a `CUevent`, a slot in
//! the host backend's registry). [`NativeBackend`] names the four primitives
//! this crate needs from such a handle, and [`UniqueToken`] owns one handle
//! and hands it back to the backend exactly once when dropped.
//!
//! ```rust,ignore
//! use accel_events::core::{make_event, BackendEvent};
//!
//! let token = make_event(&backend)?;   // unrecorded
//! stream.record(&token)?;               // submission path records it
//! let event = BackendEvent::new(device, token, errors.clone());
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use super::device::BackendKind;
use super::error::BackendError;

/// Result of a non-blocking completion query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// Work captured by the token is still in flight.
    NotReady,
    /// Work captured by the token has finished.
    Complete,
}

/// Completion primitives of one backend.
///
/// Implementations must be safe to call concurrently for the same token:
/// any number of threads may `query` or `synchronize` while the owner holds
/// the token. `release_token` is called exactly once per token, by
/// [`UniqueToken`], after every other call has returned.
pub trait NativeBackend: Send + Sync + 'static {
    /// Backend handle type.
    type Token: Copy + Eq + fmt::Debug + Send + Sync;

    /// Backend family.
    fn kind(&self) -> BackendKind;

    /// Allocate a fresh, unrecorded token.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the backend has no token to hand out.
    fn create_token(&self) -> Result<Self::Token, BackendError>;

    /// Return a token to the backend.
    fn release_token(&self, token: Self::Token);

    /// Non-blocking completion query.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` when the query itself failed; a token whose
    /// work is still running reports `Ok(QueryStatus::NotReady)`.
    fn query(&self, token: Self::Token) -> Result<QueryStatus, BackendError>;

    /// Block the calling thread until the work captured by `token` is done.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the device reports a failure for the work.
    fn synchronize(&self, token: Self::Token) -> Result<(), BackendError>;
}

/// Exclusive owner of one native completion token.
///
/// Dropping the wrapper releases the token, including during unwinding.
/// The wrapper itself never records or queries.
pub struct UniqueToken<B: NativeBackend> {
    backend: Arc<B>,
    token: Option<B::Token>,
}

impl<B: NativeBackend> UniqueToken<B> {
    /// Allocate a new, unrecorded token from `backend`.
    ///
    /// # Errors
    ///
    /// Propagates the backend's allocation failure.
    pub fn create(backend: &Arc<B>) -> Result<Self, BackendError> {
        let token = backend.create_token()?;
        trace!(backend = %backend.kind(), ?token, "completion token created");
        Ok(Self {
            backend: Arc::clone(backend),
            token: Some(token),
        })
    }

    /// Adopt a token the caller already owns, e.g. one taken from a pool.
    ///
    /// The caller gives up ownership: the token must not be released
    /// anywhere else.
    #[must_use]
    pub fn from_raw(backend: Arc<B>, token: B::Token) -> Self {
        Self {
            backend,
            token: Some(token),
        }
    }

    /// Give up ownership without releasing the token.
    #[must_use]
    pub fn into_raw(mut self) -> B::Token {
        match self.token.take() {
            Some(token) => token,
            None => unreachable!("UniqueToken without a token"),
        }
    }

    /// The wrapped native handle.
    #[must_use]
    pub fn raw(&self) -> B::Token {
        match self.token {
            Some(token) => token,
            None => unreachable!("UniqueToken without a token"),
        }
    }

    /// Backend the token was allocated from.
    #[must_use]
    pub const fn backend(&self) -> &Arc<B> {
        &self.backend
    }
}

impl<B: NativeBackend> Drop for UniqueToken<B> {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            trace!(backend = %self.backend.kind(), ?token, "completion token released");
            self.backend.release_token(token);
        }
    }
}

impl<B: NativeBackend> fmt::Debug for UniqueToken<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UniqueToken")
            .field("backend", &self.backend.kind())
            .field("token", &self.token)
            .finish()
    }
}

/// Allocate an unrecorded token for a pending submission.
///
/// The caller's submission path records it into an instruction stream and
/// then wraps it into a [`BackendEvent`](super::event::BackendEvent).
///
/// # Errors
///
/// Propagates the backend's allocation failure.
pub fn make_event<B: NativeBackend>(backend: &Arc<B>) -> Result<UniqueToken<B>, BackendError> {
    UniqueToken::create(backend)
}
