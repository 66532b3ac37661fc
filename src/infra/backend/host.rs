//! In-process host backend.
//!
//! A host device owns a registry of completion tokens and one or more
//! in-order instruction streams. Each stream is served by a dedicated OS
//! thread that executes submitted operations in order; recording a token
//! enqueues a marker, and the token completes when the worker reaches it.
//!
//! # Design
//!
//! - **No polling**: workers block on channel recv; waiters park on a
//!   per-token `Condvar`
//! - **Sticky failures**: once an operation fails, every token recorded
//!   after it on the same stream reports the failure, like a faulted GPU
//!   stream
//! - **Counted tokens**: creations and releases are counted so leaks and
//!   double releases are observable
//! - **Clean shutdown**: dropping the sender lets the worker drain and exit

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{debug, trace, warn};

use crate::config::HostBackendConfig;
use crate::core::{
    make_event, BackendError, BackendEvent, BackendKind, DeviceId, NativeBackend, QueryStatus,
    UniqueToken,
};

/// Handle of a host completion token. Ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostToken(u64);

impl HostToken {
    /// Numeric id.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

/// Token slot state.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SlotState {
    /// Allocated, not yet recorded.
    Unrecorded,
    /// Recorded, the stream has not reached it yet.
    Pending,
    /// The stream reached it with no prior failure.
    Complete,
    /// The stream reached it after an operation failed.
    Failed(String),
}

/// Token slot with Condvar-based notification.
#[derive(Debug)]
struct TokenSlot {
    state: Mutex<SlotState>,
    settled: Condvar,
}

impl TokenSlot {
    fn new() -> Self {
        Self {
            state: Mutex::new(SlotState::Unrecorded),
            settled: Condvar::new(),
        }
    }

    /// Store the final state and wake every waiter.
    fn settle(&self, outcome: SlotState) {
        let mut state = self.state.lock();
        *state = outcome;
        self.settled.notify_all();
    }

    /// Block until the slot leaves `Pending`.
    fn wait_settled(&self) -> SlotState {
        let mut state = self.state.lock();
        while *state == SlotState::Pending {
            self.settled.wait(&mut state);
        }
        state.clone()
    }
}

/// Snapshot of token accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenStats {
    /// Tokens handed out.
    pub created: u64,
    /// Tokens returned.
    pub released: u64,
    /// Tokens currently allocated.
    pub live: u64,
}

/// One simulated host device.
#[derive(Debug)]
pub struct HostBackend {
    device: DeviceId,
    slots: RwLock<HashMap<u64, Arc<TokenSlot>>>,
    next_token: AtomicU64,
    created: AtomicU64,
    released: AtomicU64,
}

impl HostBackend {
    /// Create host device number `index`.
    #[must_use]
    pub fn new(index: u32) -> Arc<Self> {
        Arc::new(Self {
            device: DeviceId::new(BackendKind::Host, index),
            slots: RwLock::new(HashMap::new()),
            next_token: AtomicU64::new(0),
            created: AtomicU64::new(0),
            released: AtomicU64::new(0),
        })
    }

    /// Identity of this device.
    #[must_use]
    pub const fn device(&self) -> DeviceId {
        self.device
    }

    /// Token accounting snapshot.
    #[must_use]
    pub fn stats(&self) -> TokenStats {
        TokenStats {
            created: self.created.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            live: self.slots.read().len() as u64,
        }
    }

    fn slot(&self, token: HostToken) -> Arc<TokenSlot> {
        let slots = self.slots.read();
        match slots.get(&token.0) {
            Some(slot) => Arc::clone(slot),
            None => panic!(
                "host token {} used after release on {}",
                token.0, self.device
            ),
        }
    }
}

impl NativeBackend for HostBackend {
    type Token = HostToken;

    fn kind(&self) -> BackendKind {
        BackendKind::Host
    }

    fn create_token(&self) -> Result<HostToken, BackendError> {
        let id = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.slots.write().insert(id, Arc::new(TokenSlot::new()));
        self.created.fetch_add(1, Ordering::Relaxed);
        trace!(device = %self.device, token = id, "host token created");
        Ok(HostToken(id))
    }

    fn release_token(&self, token: HostToken) {
        if self.slots.write().remove(&token.0).is_none() {
            panic!(
                "host token {} released twice or never allocated on {}",
                token.0, self.device
            );
        }
        self.released.fetch_add(1, Ordering::Relaxed);
        trace!(device = %self.device, token = token.0, "host token released");
    }

    fn query(&self, token: HostToken) -> Result<QueryStatus, BackendError> {
        let slot = self.slot(token);
        let state = slot.state.lock();
        match &*state {
            SlotState::Unrecorded => panic!("host token {} queried before it was recorded", token.0),
            SlotState::Pending => Ok(QueryStatus::NotReady),
            SlotState::Complete => Ok(QueryStatus::Complete),
            SlotState::Failed(msg) => Err(BackendError::Stream(msg.clone())),
        }
    }

    fn synchronize(&self, token: HostToken) -> Result<(), BackendError> {
        let slot = self.slot(token);
        match slot.wait_settled() {
            SlotState::Unrecorded => panic!("host token {} waited on before it was recorded", token.0),
            SlotState::Complete => Ok(()),
            SlotState::Failed(msg) => Err(BackendError::Stream(msg)),
            SlotState::Pending => unreachable!("wait_settled returned while pending"),
        }
    }
}

/// Operation executed by a host stream worker. An `Err` poisons the stream.
pub type HostOp = Box<dyn FnOnce() -> Result<(), String> + Send>;

enum StreamCommand {
    Run(HostOp),
    Record(Arc<TokenSlot>),
    WaitFor(Arc<TokenSlot>),
}

/// In-order instruction stream of a host device.
#[derive(Debug)]
pub struct HostStream {
    device: DeviceId,
    index: usize,
    backend: Arc<HostBackend>,
    tx: Mutex<Option<Sender<StreamCommand>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl HostStream {
    /// Spawn stream `index` of `backend`'s device.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Stream` if the worker thread cannot be spawned.
    pub fn new(
        backend: &Arc<HostBackend>,
        index: usize,
        config: &HostBackendConfig,
    ) -> Result<Self, BackendError> {
        let device = backend.device();
        let (tx, rx) = bounded::<StreamCommand>(config.max_stream_depth);
        let worker = thread::Builder::new()
            .name(format!("host-stream-{}-{index}", device.index()))
            .stack_size(config.thread_stack_size)
            .spawn(move || run_stream(device, index, &rx))
            .map_err(|e| BackendError::Stream(format!("failed to spawn stream worker: {e}")))?;

        debug!(device = %device, stream = index, "host stream started");
        Ok(Self {
            device,
            index,
            backend: Arc::clone(backend),
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Device the stream belongs to.
    #[must_use]
    pub const fn device(&self) -> DeviceId {
        self.device
    }

    /// Stream index on its device.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Backend that owns the stream's tokens.
    #[must_use]
    pub const fn backend(&self) -> &Arc<HostBackend> {
        &self.backend
    }

    /// Enqueue an operation. Blocks while the stream is at capacity.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::StreamClosed` after shutdown.
    pub fn submit<F>(&self, op: F) -> Result<(), BackendError>
    where
        F: FnOnce() -> Result<(), String> + Send + 'static,
    {
        self.send(StreamCommand::Run(Box::new(op)))
    }

    /// Record `token` at the current end of the stream.
    ///
    /// # Errors
    ///
    /// - `BackendError::BackendMismatch` if the token belongs to another device
    /// - `BackendError::AlreadyRecorded` if the token was recorded before
    /// - `BackendError::StreamClosed` after shutdown
    pub fn record(&self, token: &UniqueToken<HostBackend>) -> Result<(), BackendError> {
        if !Arc::ptr_eq(token.backend(), &self.backend) {
            return Err(BackendError::BackendMismatch);
        }
        let slot = self.backend.slot(token.raw());
        {
            let mut state = slot.state.lock();
            if *state != SlotState::Unrecorded {
                return Err(BackendError::AlreadyRecorded);
            }
            *state = SlotState::Pending;
        }
        trace!(device = %self.device, stream = self.index, token = token.raw().id(), "token recorded");

        if let Err(err) = self.send(StreamCommand::Record(Arc::clone(&slot))) {
            *slot.state.lock() = SlotState::Unrecorded;
            return Err(err);
        }
        Ok(())
    }

    /// Make later work on this stream wait until `event` completes. The
    /// event may belong to any host device; this is how the scheduler
    /// inserts explicit cross-device synchronization.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::StreamClosed` after shutdown.
    pub fn wait_for(&self, event: &BackendEvent<HostBackend>) -> Result<(), BackendError> {
        let token = event.token();
        let slot = token.backend().slot(token.raw());
        assert!(
            *slot.state.lock() != SlotState::Unrecorded,
            "stream wait on host token {} that was never recorded",
            token.raw().id()
        );
        self.send(StreamCommand::WaitFor(slot))
    }

    /// Block until everything enqueued so far has executed.
    ///
    /// # Errors
    ///
    /// Returns the stream's sticky failure, or `StreamClosed` after shutdown.
    pub fn synchronize(&self) -> Result<(), BackendError> {
        let token = make_event(&self.backend)?;
        self.record(&token)?;
        self.backend.synchronize(token.raw())
    }

    /// Stop accepting work, let the worker drain its queue, and join it.
    pub fn shutdown(&self) {
        drop(self.tx.lock().take());
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if worker.join().is_err() {
                warn!(device = %self.device, stream = self.index, "host stream worker panicked");
            } else {
                debug!(device = %self.device, stream = self.index, "host stream joined");
            }
        }
    }

    fn send(&self, command: StreamCommand) -> Result<(), BackendError> {
        // Clone the sender so a full queue does not block shutdown.
        let tx = self.tx.lock().clone().ok_or(BackendError::StreamClosed)?;
        tx.send(command).map_err(|_| BackendError::StreamClosed)
    }
}

impl Drop for HostStream {
    fn drop(&mut self) {
        // Don't join here; the worker drains what is queued and exits.
        if self.tx.lock().take().is_some() {
            debug!(device = %self.device, stream = self.index, "host stream dropped without explicit shutdown");
        }
    }
}

/// Worker loop: blocking recv, exits once every sender is gone.
fn run_stream(device: DeviceId, index: usize, rx: &Receiver<StreamCommand>) {
    let mut failure: Option<String> = None;

    for command in rx {
        match command {
            StreamCommand::Run(op) => {
                if failure.is_some() {
                    trace!(device = %device, stream = index, "skipping operation on failed stream");
                    continue;
                }
                let outcome = catch_unwind(AssertUnwindSafe(op))
                    .unwrap_or_else(|_| Err("operation panicked".to_string()));
                if let Err(msg) = outcome {
                    warn!(device = %device, stream = index, error = %msg, "stream operation failed");
                    failure = Some(msg);
                }
            }
            StreamCommand::Record(slot) => {
                let outcome = failure
                    .as_ref()
                    .map_or(SlotState::Complete, |msg| SlotState::Failed(msg.clone()));
                slot.settle(outcome);
            }
            StreamCommand::WaitFor(slot) => {
                if let SlotState::Failed(msg) = slot.wait_settled() {
                    failure.get_or_insert_with(|| format!("dependency failed: {msg}"));
                }
            }
        }
    }

    debug!(device = %device, stream = index, "host stream worker exiting");
}
