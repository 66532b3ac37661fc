//! Tokio adapters for awaiting completion events.
//!
//! `DagNodeEvent::wait` parks an OS thread, so it is moved onto tokio's
//! blocking pool instead of stalling a runtime worker.

use std::sync::Arc;

use tracing::trace;

use crate::core::{DagNodeEvent, EventError};

/// Await completion of `event` without blocking the async runtime.
///
/// # Errors
///
/// Returns `EventError::Internal` if the blocking task could not be joined.
pub async fn wait_async(event: Arc<dyn DagNodeEvent>) -> Result<(), EventError> {
    // Fast path: already complete, no blocking task needed.
    if event.is_complete() {
        return Ok(());
    }
    trace!(device = %event.device(), "awaiting completion event on blocking pool");
    tokio::task::spawn_blocking(move || event.wait())
        .await
        .map_err(|e| EventError::Internal(format!("event wait task failed: {e}")))
}

/// Await completion of every event concurrently.
///
/// # Errors
///
/// Returns the first join failure.
pub async fn wait_all_async(events: Vec<Arc<dyn DagNodeEvent>>) -> Result<(), EventError> {
    let handles: Vec<_> = events
        .into_iter()
        .map(|event| tokio::spawn(wait_async(event)))
        .collect();
    for handle in handles {
        handle
            .await
            .map_err(|e| EventError::Internal(format!("event wait task failed: {e}")))??;
    }
    Ok(())
}
