//! Builders to construct event runtimes from configuration.

#[cfg(not(target_arch = "wasm32"))]
pub mod runtime_builder;

#[cfg(not(target_arch = "wasm32"))]
pub use runtime_builder::{build_host_runtime, HostDevice, HostRuntime};
