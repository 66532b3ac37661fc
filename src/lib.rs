//! # Accel Events
//!
//! Backend-agnostic completion events for the DAG scheduler of a
//! heterogeneous-compute runtime.
//!
//! Every accelerator backend has its own opaque handle for "this submitted
//! work has finished" (a `hipEvent_t`, a `CUevent`, ...). This crate puts one
//! contract on top of them, [`DagNodeEvent`](core::DagNodeEvent):
//! non-blocking `is_complete()`, blocking `wait()`, and the `device()` the
//! work runs on, so the scheduler can decide when cross-device
//! synchronization is needed.
//!
//! ## Key Features
//!
//! - **Scoped native handles**: [`UniqueToken`](core::UniqueToken) releases
//!   its backend token exactly once, on every exit path
//! - **Static dispatch inside, trait objects outside**: one
//!   [`BackendEvent`](core::BackendEvent) per backend, `dyn DagNodeEvent` for
//!   the scheduler
//! - **Monotonic completion**: once an event reports completion it never
//!   flips back, and later polls skip the backend
//! - **Deferred error delivery**: backend failures are reported into an
//!   [`AsyncErrorQueue`](core::AsyncErrorQueue) and handed to a user handler
//!   at explicit flush points instead of being raised on whatever thread
//!   happened to observe them
//! - **Host backend**: an in-process device with in-order worker-thread
//!   streams, usable without any GPU
//!
//! ## Lifecycle
//!
//! ```
//! use accel_events::builders::build_host_runtime;
//! use accel_events::config::{EventRuntimeConfig, UnhandledErrorPolicy};
//! use accel_events::core::{DagNode, DagNodeEvent};
//!
//! let mut cfg = EventRuntimeConfig::default();
//! cfg.unhandled_errors = UnhandledErrorPolicy::Panic;
//! let rt = build_host_runtime(&cfg).unwrap();
//!
//! // Submission path: enqueue work, then record an event behind it.
//! rt.submit(0, 0, || Ok(())).unwrap();
//! let event = rt.record_event(0, 0).unwrap();
//!
//! // Scheduler: the event becomes the node's exit signal.
//! let node = DagNode::new(event.device());
//! node.mark_submitted(event).unwrap();
//! node.wait().unwrap();
//! assert!(node.is_complete());
//!
//! rt.errors().flush();
//! rt.shutdown();
//! ```

#![deny(warnings)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Completion events, token ownership and the asynchronous error channel.
pub mod core;
/// Configuration models for the runtime and its backends.
pub mod config;
/// Builders to construct event runtimes from configuration.
pub mod builders;
/// Native backend adapters.
pub mod infra;
/// Scheduler-facing helpers and async runtime adapters.
pub mod runtime;
/// Shared utilities.
pub mod util;
