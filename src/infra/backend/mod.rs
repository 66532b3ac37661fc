//! Backend implementations of [`NativeBackend`](crate::core::NativeBackend).
//!
//! - `host`: in-process device driven by stream worker threads (native only)
//! - `hip`: ROCm HIP events (feature `hip`)

#[cfg(not(target_arch = "wasm32"))]
pub mod host;
#[cfg(feature = "hip")]
pub mod hip;

#[cfg(not(target_arch = "wasm32"))]
pub use host::{HostBackend, HostOp, HostStream, HostToken, TokenStats};
#[cfg(feature = "hip")]
pub use hip::{HipBackend, HipEventHandle, HipStream};
