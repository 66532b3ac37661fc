//! ROCm HIP backend.
//!
//! Completion tokens are `hipEvent_t` handles created with timing disabled;
//! they are only used for synchronization.

#![allow(unsafe_code)]

use std::ffi::{c_char, c_void, CStr};
use std::ptr::{self, NonNull};
use std::sync::Arc;

use tracing::{debug, error, trace};

use crate::core::{BackendError, BackendKind, DeviceId, NativeBackend, QueryStatus, UniqueToken};

mod ffi {
    use std::ffi::{c_char, c_void};

    pub const HIP_SUCCESS: i32 = 0;
    pub const HIP_ERROR_NOT_READY: i32 = 600;
    pub const HIP_EVENT_DISABLE_TIMING: u32 = 0x2;

    #[link(name = "amdhip64")]
    extern "C" {
        pub fn hipSetDevice(device: i32) -> i32;
        pub fn hipEventCreateWithFlags(event: *mut *mut c_void, flags: u32) -> i32;
        pub fn hipEventDestroy(event: *mut c_void) -> i32;
        pub fn hipEventRecord(event: *mut c_void, stream: *mut c_void) -> i32;
        pub fn hipEventQuery(event: *mut c_void) -> i32;
        pub fn hipEventSynchronize(event: *mut c_void) -> i32;
        pub fn hipStreamCreate(stream: *mut *mut c_void) -> i32;
        pub fn hipStreamDestroy(stream: *mut c_void) -> i32;
        pub fn hipGetErrorString(error: i32) -> *const c_char;
    }
}

fn error_string(code: i32) -> String {
    // SAFETY: hipGetErrorString returns a pointer to a static string or null.
    let raw: *const c_char = unsafe { ffi::hipGetErrorString(code) };
    if raw.is_null() {
        return format!("hip error {code}");
    }
    // SAFETY: non-null, NUL-terminated, static lifetime.
    unsafe { CStr::from_ptr(raw) }.to_string_lossy().into_owned()
}

fn check(api: &'static str, code: i32) -> Result<(), BackendError> {
    if code == ffi::HIP_SUCCESS {
        Ok(())
    } else {
        Err(BackendError::Native {
            api,
            code,
            message: error_string(code),
        })
    }
}

/// A `hipEvent_t`. Never null.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HipEventHandle(NonNull<c_void>);

// SAFETY: hipEvent_t handles are plain identifiers into the HIP runtime,
// which is thread-safe; ownership is tracked by UniqueToken.
unsafe impl Send for HipEventHandle {}
// SAFETY: see above; query and synchronize may run concurrently.
unsafe impl Sync for HipEventHandle {}

impl HipEventHandle {
    /// Raw pointer for native calls.
    #[must_use]
    pub const fn as_ptr(self) -> *mut c_void {
        self.0.as_ptr()
    }
}

/// Completion primitives of one HIP device.
#[derive(Debug)]
pub struct HipBackend {
    device: DeviceId,
}

impl HipBackend {
    /// Backend for HIP device ordinal `index`.
    #[must_use]
    pub fn new(index: u32) -> Arc<Self> {
        Arc::new(Self {
            device: DeviceId::new(BackendKind::Hip, index),
        })
    }

    /// Identity of this device.
    #[must_use]
    pub const fn device(&self) -> DeviceId {
        self.device
    }

    fn activate(&self) -> Result<(), BackendError> {
        let ordinal = i32::try_from(self.device.index())
            .map_err(|_| BackendError::TokenCreation(format!("device ordinal {} out of range", self.device.index())))?;
        // SAFETY: plain call with a value argument.
        check("hipSetDevice", unsafe { ffi::hipSetDevice(ordinal) })
    }
}

impl NativeBackend for HipBackend {
    type Token = HipEventHandle;

    fn kind(&self) -> BackendKind {
        BackendKind::Hip
    }

    fn create_token(&self) -> Result<HipEventHandle, BackendError> {
        self.activate()?;
        let mut event: *mut c_void = ptr::null_mut();
        // SAFETY: `event` is a valid out-pointer for the duration of the call.
        let rc = unsafe { ffi::hipEventCreateWithFlags(&mut event, ffi::HIP_EVENT_DISABLE_TIMING) };
        check("hipEventCreateWithFlags", rc)?;
        let handle = NonNull::new(event).ok_or_else(|| {
            BackendError::TokenCreation("hipEventCreateWithFlags returned null".into())
        })?;
        trace!(device = %self.device, event = ?handle, "hip event created");
        Ok(HipEventHandle(handle))
    }

    fn release_token(&self, token: HipEventHandle) {
        // SAFETY: the token is owned by exactly one UniqueToken, which calls
        // this once after all other uses have returned.
        let rc = unsafe { ffi::hipEventDestroy(token.as_ptr()) };
        if rc != ffi::HIP_SUCCESS {
            error!(device = %self.device, code = rc, message = %error_string(rc), "hipEventDestroy failed");
        }
    }

    fn query(&self, token: HipEventHandle) -> Result<QueryStatus, BackendError> {
        // SAFETY: the token is live while its owner exists.
        match unsafe { ffi::hipEventQuery(token.as_ptr()) } {
            ffi::HIP_SUCCESS => Ok(QueryStatus::Complete),
            ffi::HIP_ERROR_NOT_READY => Ok(QueryStatus::NotReady),
            code => Err(BackendError::Native {
                api: "hipEventQuery",
                code,
                message: error_string(code),
            }),
        }
    }

    fn synchronize(&self, token: HipEventHandle) -> Result<(), BackendError> {
        // SAFETY: the token is live while its owner exists.
        check("hipEventSynchronize", unsafe { ffi::hipEventSynchronize(token.as_ptr()) })
    }
}

/// A HIP stream that completion tokens can be recorded into.
#[derive(Debug)]
pub struct HipStream {
    backend: Arc<HipBackend>,
    stream: NonNull<c_void>,
}

// SAFETY: HIP streams may be used from any host thread.
unsafe impl Send for HipStream {}
// SAFETY: see above.
unsafe impl Sync for HipStream {}

impl HipStream {
    /// Create a stream on `backend`'s device.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Native` if the runtime refuses.
    pub fn new(backend: &Arc<HipBackend>) -> Result<Self, BackendError> {
        backend.activate()?;
        let mut stream: *mut c_void = ptr::null_mut();
        // SAFETY: `stream` is a valid out-pointer for the duration of the call.
        check("hipStreamCreate", unsafe { ffi::hipStreamCreate(&mut stream) })?;
        let stream = NonNull::new(stream)
            .ok_or_else(|| BackendError::Stream("hipStreamCreate returned null".into()))?;
        debug!(device = %backend.device(), "hip stream created");
        Ok(Self {
            backend: Arc::clone(backend),
            stream,
        })
    }

    /// Record `token` at the current end of the stream.
    ///
    /// # Errors
    ///
    /// - `BackendError::BackendMismatch` if the token belongs to another device
    /// - `BackendError::Native` if `hipEventRecord` fails
    pub fn record(&self, token: &UniqueToken<HipBackend>) -> Result<(), BackendError> {
        if !Arc::ptr_eq(token.backend(), &self.backend) {
            return Err(BackendError::BackendMismatch);
        }
        // SAFETY: both handles are live for the duration of the call.
        let rc = unsafe { ffi::hipEventRecord(token.raw().as_ptr(), self.stream.as_ptr()) };
        check("hipEventRecord", rc)
    }
}

impl Drop for HipStream {
    fn drop(&mut self) {
        // SAFETY: the stream is owned by this value and destroyed once.
        let rc = unsafe { ffi::hipStreamDestroy(self.stream.as_ptr()) };
        if rc != ffi::HIP_SUCCESS {
            error!(device = %self.backend.device(), code = rc, "hipStreamDestroy failed");
        }
    }
}
