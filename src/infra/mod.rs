//! Infrastructure adapters: the native backends completion events run on.

pub mod backend;

#[cfg(not(target_arch = "wasm32"))]
pub use backend::{HostBackend, HostStream, HostToken, TokenStats};
