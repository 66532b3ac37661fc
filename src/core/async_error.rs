//! Asynchronous error channel.
//!
//! Failures of device-side work are observed by whichever thread happens to
//! poll or wait on the matching event, which is usually unrelated to the
//! thread that submitted the work. They are therefore never raised at the
//! observation site: events [`report`](AsyncErrorQueue::report) an
//! [`Exception`] into an [`AsyncErrorQueue`], and the queue hands the
//! accumulated [`ExceptionList`] to a user-registered handler at an explicit
//! [`flush`](AsyncErrorQueue::flush).
//!
//! ```
//! use accel_events::core::{AsyncErrorQueue, Errc, Exception};
//! use std::sync::{Arc, Mutex};
//!
//! let queue = AsyncErrorQueue::new();
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&seen);
//! queue.register_handler(move |list| {
//!     sink.lock().unwrap().extend(list.iter().map(|e| e.code().value()));
//! });
//!
//! queue.report(Exception::new(Errc::Event));
//! queue.report(Exception::with_message(Errc::Kernel, "kernel fault"));
//! queue.flush();
//!
//! assert_eq!(*seen.lock().unwrap(), vec![5, 2]);
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use tracing::{debug, error, warn};

use super::device::Context;
use crate::config::UnhandledErrorPolicy;

/// A family of error codes with a fixed human readable message.
#[derive(Debug, PartialEq, Eq)]
pub struct ErrorCategory {
    name: &'static str,
    message: &'static str,
}

impl ErrorCategory {
    /// Category name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Message used by exceptions that carry no custom text.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        self.message
    }
}

/// The runtime's single error category.
pub static SYCL_CATEGORY: ErrorCategory = ErrorCategory {
    name: "sycl",
    message: "device runtime error",
};

/// Symbolic error codes of [`SYCL_CATEGORY`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Errc {
    /// No error.
    Success = 0,
    /// Generic runtime failure.
    Runtime,
    /// Kernel execution failure.
    Kernel,
    /// Invalid accessor use.
    Accessor,
    /// Invalid launch range.
    NdRange,
    /// Completion event query or wait failure.
    Event,
    /// Invalid kernel argument.
    KernelArgument,
    /// Program build failure.
    Build,
    /// Invalid object or parameter.
    Invalid,
    /// Device allocation failure.
    MemoryAllocation,
    /// Platform level failure.
    Platform,
    /// Profiling information unavailable.
    Profiling,
    /// Optional feature not supported by the device.
    FeatureNotSupported,
    /// Kernel not supported by the device.
    KernelNotSupported,
    /// Objects from different backends were mixed.
    BackendMismatch,
}

impl Errc {
    /// Every code, indexed by its raw value.
    pub const ALL: [Self; 15] = [
        Self::Success,
        Self::Runtime,
        Self::Kernel,
        Self::Accessor,
        Self::NdRange,
        Self::Event,
        Self::KernelArgument,
        Self::Build,
        Self::Invalid,
        Self::MemoryAllocation,
        Self::Platform,
        Self::Profiling,
        Self::FeatureNotSupported,
        Self::KernelNotSupported,
        Self::BackendMismatch,
    ];

    /// Look up the symbolic code for a raw value.
    #[must_use]
    pub fn from_value(value: i32) -> Option<Self> {
        usize::try_from(value)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
    }

    /// Snake-case symbolic name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Runtime => "runtime",
            Self::Kernel => "kernel",
            Self::Accessor => "accessor",
            Self::NdRange => "nd_range",
            Self::Event => "event",
            Self::KernelArgument => "kernel_argument",
            Self::Build => "build",
            Self::Invalid => "invalid",
            Self::MemoryAllocation => "memory_allocation",
            Self::Platform => "platform",
            Self::Profiling => "profiling",
            Self::FeatureNotSupported => "feature_not_supported",
            Self::KernelNotSupported => "kernel_not_supported",
            Self::BackendMismatch => "backend_mismatch",
        }
    }
}

impl fmt::Display for Errc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw error value paired with its category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCode {
    value: i32,
    category: &'static ErrorCategory,
}

impl ErrorCode {
    /// Build a code from a raw value in an arbitrary category.
    #[must_use]
    pub const fn new(value: i32, category: &'static ErrorCategory) -> Self {
        Self { value, category }
    }

    /// Raw value.
    #[must_use]
    pub const fn value(self) -> i32 {
        self.value
    }

    /// Category the value belongs to.
    #[must_use]
    pub const fn category(self) -> &'static ErrorCategory {
        self.category
    }

    /// Symbolic code, if this is a known value of [`SYCL_CATEGORY`].
    #[must_use]
    pub fn errc(self) -> Option<Errc> {
        if self.category == &SYCL_CATEGORY {
            Errc::from_value(self.value)
        } else {
            None
        }
    }
}

impl From<Errc> for ErrorCode {
    fn from(errc: Errc) -> Self {
        Self::new(errc as i32, &SYCL_CATEGORY)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errc() {
            Some(errc) => write!(f, "{}:{errc}", self.category.name),
            None => write!(f, "{}:{}", self.category.name, self.value),
        }
    }
}

/// One reported failure.
#[derive(Debug, Clone)]
pub struct Exception {
    code: ErrorCode,
    message: Option<String>,
    context: Option<Arc<Context>>,
}

impl Exception {
    /// Exception carrying the category's fixed message.
    #[must_use]
    pub fn new(code: impl Into<ErrorCode>) -> Self {
        Self {
            code: code.into(),
            message: None,
            context: None,
        }
    }

    /// Exception with a custom message.
    #[must_use]
    pub fn with_message(code: impl Into<ErrorCode>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: Some(message.into()),
            context: None,
        }
    }

    /// Attach the runtime context the failure belongs to.
    #[must_use]
    pub fn in_context(mut self, context: Arc<Context>) -> Self {
        self.context = Some(context);
        self
    }

    /// Error code.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        self.code
    }

    /// Category of the error code.
    #[must_use]
    pub const fn category(&self) -> &'static ErrorCategory {
        self.code.category
    }

    /// Custom message, or the category message when none was supplied.
    #[must_use]
    pub fn what(&self) -> &str {
        self.message.as_deref().unwrap_or(self.code.category.message)
    }

    /// Whether a context is attached.
    #[must_use]
    pub const fn has_context(&self) -> bool {
        self.context.is_some()
    }

    /// Attached context, if any.
    #[must_use]
    pub const fn context(&self) -> Option<&Arc<Context>> {
        self.context.as_ref()
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.what())
    }
}

impl std::error::Error for Exception {}

/// Ordered batch of exceptions, oldest first.
#[derive(Debug, Clone, Default)]
pub struct ExceptionList {
    exceptions: Vec<Exception>,
}

impl ExceptionList {
    /// Number of exceptions in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.exceptions.len()
    }

    /// Whether the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exceptions.is_empty()
    }

    /// Iterate in detection order.
    pub fn iter(&self) -> std::slice::Iter<'_, Exception> {
        self.exceptions.iter()
    }

    /// Consume into the underlying vector.
    #[must_use]
    pub fn into_vec(self) -> Vec<Exception> {
        self.exceptions
    }
}

impl From<Vec<Exception>> for ExceptionList {
    fn from(exceptions: Vec<Exception>) -> Self {
        Self { exceptions }
    }
}

impl IntoIterator for ExceptionList {
    type Item = Exception;
    type IntoIter = std::vec::IntoIter<Exception>;

    fn into_iter(self) -> Self::IntoIter {
        self.exceptions.into_iter()
    }
}

impl<'a> IntoIterator for &'a ExceptionList {
    type Item = &'a Exception;
    type IntoIter = std::slice::Iter<'a, Exception>;

    fn into_iter(self) -> Self::IntoIter {
        self.exceptions.iter()
    }
}

impl fmt::Display for ExceptionList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (idx, exception) in self.exceptions.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{exception}")?;
        }
        f.write_str("]")
    }
}

/// Callback receiving accumulated failures at a flush point.
pub type AsyncHandler = Arc<dyn Fn(ExceptionList) + Send + Sync>;

struct QueueInner {
    pending: Mutex<Vec<Exception>>,
    handler: RwLock<Option<AsyncHandler>>,
    // Serializes deliveries so batches reach the handler in detection order.
    // Reentrant so a handler may flush again.
    delivery: ReentrantMutex<()>,
    policy: UnhandledErrorPolicy,
    context: Option<Arc<Context>>,
}

/// Accumulates asynchronous failures until the next flush.
///
/// Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct AsyncErrorQueue {
    inner: Arc<QueueInner>,
}

impl AsyncErrorQueue {
    /// Queue with the default (abort) policy and no context.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(UnhandledErrorPolicy::default(), None)
    }

    /// Queue with an explicit policy for flushes without a handler.
    #[must_use]
    pub fn with_policy(policy: UnhandledErrorPolicy) -> Self {
        Self::with_options(policy, None)
    }

    /// Queue with a policy and a context stamped on every exception that is
    /// reported without one.
    #[must_use]
    pub fn with_options(policy: UnhandledErrorPolicy, context: Option<Arc<Context>>) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                pending: Mutex::new(Vec::new()),
                handler: RwLock::new(None),
                delivery: ReentrantMutex::new(()),
                policy,
                context,
            }),
        }
    }

    /// Install (or replace) the handler that receives flushed batches.
    pub fn register_handler<F>(&self, handler: F)
    where
        F: Fn(ExceptionList) + Send + Sync + 'static,
    {
        *self.inner.handler.write() = Some(Arc::new(handler));
        debug!("async error handler registered");
    }

    /// Whether a handler is installed.
    #[must_use]
    pub fn has_handler(&self) -> bool {
        self.inner.handler.read().is_some()
    }

    /// Policy applied when a non-empty batch is flushed without a handler.
    #[must_use]
    pub fn policy(&self) -> UnhandledErrorPolicy {
        self.inner.policy
    }

    /// Append a failure. Never blocks on delivery.
    pub fn report(&self, exception: Exception) {
        let exception = match (&self.inner.context, exception.has_context()) {
            (Some(ctx), false) => exception.in_context(Arc::clone(ctx)),
            _ => exception,
        };
        warn!(code = %exception.code(), what = exception.what(), "asynchronous error reported");
        self.inner.pending.lock().push(exception);
    }

    /// Number of failures waiting for the next flush.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Deliver everything reported so far, in detection order, exactly once.
    ///
    /// Nothing is delivered when no failure was reported. Without a
    /// registered handler the configured [`UnhandledErrorPolicy`] applies.
    pub fn flush(&self) {
        let _delivery = self.inner.delivery.lock();
        let batch = std::mem::take(&mut *self.inner.pending.lock());
        if batch.is_empty() {
            return;
        }
        let list = ExceptionList::from(batch);

        let handler = self.inner.handler.read().clone();
        match handler {
            Some(handler) => {
                debug!(count = list.len(), "delivering asynchronous errors");
                handler(list);
            }
            None => unhandled(self.inner.policy, &list),
        }
    }
}

impl Default for AsyncErrorQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AsyncErrorQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncErrorQueue")
            .field("pending", &self.pending())
            .field("has_handler", &self.has_handler())
            .field("policy", &self.inner.policy)
            .finish()
    }
}

fn unhandled(policy: UnhandledErrorPolicy, list: &ExceptionList) -> ! {
    match policy {
        UnhandledErrorPolicy::Abort => {
            for exception in list {
                error!(code = %exception.code(), what = exception.what(), "unhandled asynchronous error");
            }
            error!(count = list.len(), "no async handler registered, aborting");
            std::process::abort()
        }
        UnhandledErrorPolicy::Panic => {
            panic!("unhandled asynchronous errors: {list}")
        }
    }
}
