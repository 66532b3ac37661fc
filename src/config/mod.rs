//! Configuration models for the event runtime and its backends.

pub mod runtime;

pub use runtime::{EventRuntimeConfig, HostBackendConfig, UnhandledErrorPolicy};
