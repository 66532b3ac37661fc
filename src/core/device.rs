//! Device identity and runtime context.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Accelerator backend families known to the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// In-process host backend driven by stream worker threads.
    Host,
    /// AMD ROCm HIP.
    Hip,
    /// NVIDIA CUDA.
    Cuda,
}

impl BackendKind {
    /// Short lowercase name, used in logs and device labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Hip => "hip",
            Self::Cuda => "cuda",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable identity of one compute device of one backend.
///
/// Assigned at device enumeration and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId {
    backend: BackendKind,
    index: u32,
}

impl DeviceId {
    /// Create a device identity from a backend and its device ordinal.
    #[must_use]
    pub const fn new(backend: BackendKind, index: u32) -> Self {
        Self { backend, index }
    }

    /// Backend this device belongs to.
    #[must_use]
    pub const fn backend(self) -> BackendKind {
        self.backend
    }

    /// Device ordinal within its backend.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Whether two devices share a backend, i.e. native tokens of one could
    /// in principle be understood by the other.
    #[must_use]
    pub fn same_backend(self, other: Self) -> bool {
        self.backend == other.backend
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.backend, self.index)
    }
}

/// Runtime context a set of devices (and the failures they report) belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    id: Uuid,
    devices: Vec<DeviceId>,
}

impl Context {
    /// Create a context over the given devices with a fresh identifier.
    #[must_use]
    pub fn new(devices: Vec<DeviceId>) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            devices,
        })
    }

    /// Unique context identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Devices that are part of this context.
    #[must_use]
    pub fn devices(&self) -> &[DeviceId] {
        &self.devices
    }

    /// Whether `device` belongs to this context.
    #[must_use]
    pub fn contains(&self, device: DeviceId) -> bool {
        self.devices.contains(&device)
    }
}
