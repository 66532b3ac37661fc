//! Build a host event runtime from configuration.

use std::sync::Arc;

use tracing::info;

use crate::config::EventRuntimeConfig;
use crate::core::{
    make_event, AsyncErrorQueue, BackendEvent, BackendKind, Context, DeviceId, EventError,
};
use crate::infra::backend::{HostBackend, HostStream};

/// One host device with its instruction streams.
#[derive(Debug)]
pub struct HostDevice {
    backend: Arc<HostBackend>,
    streams: Vec<HostStream>,
}

impl HostDevice {
    /// Device identity.
    #[must_use]
    pub fn id(&self) -> DeviceId {
        self.backend.device()
    }

    /// Token backend of the device.
    #[must_use]
    pub const fn backend(&self) -> &Arc<HostBackend> {
        &self.backend
    }

    /// All streams of the device.
    #[must_use]
    pub fn streams(&self) -> &[HostStream] {
        &self.streams
    }

    /// Stream number `index`.
    ///
    /// # Errors
    ///
    /// Returns `EventError::UnknownStream` if the device has no such stream.
    pub fn stream(&self, index: usize) -> Result<&HostStream, EventError> {
        self.streams.get(index).ok_or(EventError::UnknownStream {
            device: self.id(),
            stream: index,
        })
    }
}

/// Host devices sharing one context and one asynchronous error queue.
#[derive(Debug)]
pub struct HostRuntime {
    context: Arc<Context>,
    errors: AsyncErrorQueue,
    devices: Vec<HostDevice>,
}

impl HostRuntime {
    /// Runtime context.
    #[must_use]
    pub const fn context(&self) -> &Arc<Context> {
        &self.context
    }

    /// Error queue shared by every event this runtime creates.
    #[must_use]
    pub const fn errors(&self) -> &AsyncErrorQueue {
        &self.errors
    }

    /// All devices.
    #[must_use]
    pub fn devices(&self) -> &[HostDevice] {
        &self.devices
    }

    /// Device number `index`.
    ///
    /// # Errors
    ///
    /// Returns `EventError::UnknownDevice` if there is no such device.
    pub fn device(&self, index: u32) -> Result<&HostDevice, EventError> {
        usize::try_from(index)
            .ok()
            .and_then(|idx| self.devices.get(idx))
            .ok_or(EventError::UnknownDevice(DeviceId::new(BackendKind::Host, index)))
    }

    /// Enqueue an operation on a device stream.
    ///
    /// # Errors
    ///
    /// Unknown device or stream, or a closed stream.
    pub fn submit<F>(&self, device: u32, stream: usize, op: F) -> Result<(), EventError>
    where
        F: FnOnce() -> Result<(), String> + Send + 'static,
    {
        self.device(device)?.stream(stream)?.submit(op)?;
        Ok(())
    }

    /// Allocate a token, record it at the end of a device stream and wrap
    /// it into a completion event reporting into this runtime's error queue.
    ///
    /// # Errors
    ///
    /// Unknown device or stream, token allocation failure, or a closed stream.
    pub fn record_event(
        &self,
        device: u32,
        stream: usize,
    ) -> Result<BackendEvent<HostBackend>, EventError> {
        let dev = self.device(device)?;
        let stream = dev.stream(stream)?;
        let token = make_event(dev.backend())?;
        stream.record(&token)?;
        Ok(BackendEvent::new(dev.id(), token, self.errors.clone()))
    }

    /// Shut down every stream, draining queued work.
    pub fn shutdown(&self) {
        for device in &self.devices {
            for stream in &device.streams {
                stream.shutdown();
            }
        }
        info!(context = %self.context.id(), "host runtime shut down");
    }
}

/// Build host devices, streams and the error queue from configuration.
///
/// # Errors
///
/// - `EventError::InvalidConfig` if validation fails
/// - `EventError::Backend` if a stream worker cannot be started
pub fn build_host_runtime(cfg: &EventRuntimeConfig) -> Result<HostRuntime, EventError> {
    cfg.validate()
        .map_err(|e| EventError::InvalidConfig(format!("config invalid: {e}")))?;

    let backends: Vec<Arc<HostBackend>> = (0..cfg.host.device_count).map(HostBackend::new).collect();
    let context = Context::new(backends.iter().map(|b| b.device()).collect());
    let errors = AsyncErrorQueue::with_options(cfg.unhandled_errors, Some(Arc::clone(&context)));

    let mut devices = Vec::with_capacity(backends.len());
    for backend in backends {
        let streams = (0..cfg.host.streams_per_device)
            .map(|idx| HostStream::new(&backend, idx, &cfg.host))
            .collect::<Result<Vec<_>, _>>()?;
        devices.push(HostDevice { backend, streams });
    }

    info!(
        context = %context.id(),
        devices = cfg.host.device_count,
        streams_per_device = cfg.host.streams_per_device,
        policy = ?cfg.unhandled_errors,
        "host event runtime initialized"
    );

    Ok(HostRuntime {
        context,
        errors,
        devices,
    })
}
