//! DAG node exit signals.

use std::fmt;
use std::sync::{Arc, OnceLock};

use tracing::debug;
use uuid::Uuid;

use super::device::DeviceId;
use super::error::EventError;
use super::event::DagNodeEvent;

/// A unit of submitted work in the dependency graph, as far as completion
/// tracking is concerned.
///
/// The node is created when the scheduler assigns work to a device and
/// receives its completion event once the submission path has recorded it.
/// The event is set at most once.
pub struct DagNode {
    id: Uuid,
    device: DeviceId,
    event: OnceLock<Arc<dyn DagNodeEvent>>,
}

impl DagNode {
    /// New, not yet submitted node assigned to `device`.
    #[must_use]
    pub fn new(device: DeviceId) -> Self {
        Self {
            id: Uuid::new_v4(),
            device,
            event: OnceLock::new(),
        }
    }

    /// Node identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Device the node was assigned to.
    #[must_use]
    pub const fn device(&self) -> DeviceId {
        self.device
    }

    /// Attach the exit signal of the submitted work.
    ///
    /// # Errors
    ///
    /// - `EventError::DeviceMismatch` if the event belongs to another device
    /// - `EventError::AlreadySubmitted` if the node already has an event
    pub fn mark_submitted<E>(&self, event: E) -> Result<(), EventError>
    where
        E: DagNodeEvent + 'static,
    {
        self.attach(Arc::new(event))
    }

    /// Same as [`Self::mark_submitted`] for an already shared event.
    ///
    /// # Errors
    ///
    /// See [`Self::mark_submitted`].
    pub fn attach(&self, event: Arc<dyn DagNodeEvent>) -> Result<(), EventError> {
        if event.device() != self.device {
            return Err(EventError::DeviceMismatch {
                expected: self.device,
                actual: event.device(),
            });
        }
        self.event
            .set(event)
            .map_err(|_| EventError::AlreadySubmitted(self.id))?;
        debug!(node = %self.id, device = %self.device, "node submitted");
        Ok(())
    }

    /// Whether an exit signal has been attached.
    #[must_use]
    pub fn is_submitted(&self) -> bool {
        self.event.get().is_some()
    }

    /// The exit signal, if submitted.
    #[must_use]
    pub fn event(&self) -> Option<&Arc<dyn DagNodeEvent>> {
        self.event.get()
    }

    /// Non-blocking: `true` once the submitted work has completed. A node
    /// that was never submitted is not complete.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.event.get().is_some_and(|event| event.is_complete())
    }

    /// Block until the submitted work has completed.
    ///
    /// # Errors
    ///
    /// Returns `EventError::NotSubmitted` if the node has no exit signal yet.
    pub fn wait(&self) -> Result<(), EventError> {
        let event = self.event.get().ok_or(EventError::NotSubmitted(self.id))?;
        event.wait();
        Ok(())
    }

    /// Whether a dependent operation on `dependent` must be ordered after
    /// this node by explicit synchronization. Events carry no ordering
    /// guarantee across devices.
    #[must_use]
    pub fn requires_cross_device_sync(&self, dependent: DeviceId) -> bool {
        let producer = self.event.get().map_or(self.device, |event| event.device());
        producer != dependent
    }
}

impl fmt::Debug for DagNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DagNode")
            .field("id", &self.id)
            .field("device", &self.device)
            .field("event", &self.event.get())
            .finish()
    }
}
