//! Host loop
//!
//! The host is strictly single-threaded: every delivery runs to completion
//! on the thread that created the [`Host`] before the next one starts.
//! `Host` is `!Send`, so any API taking `&Host` is statically confined to
//! that thread. Engine threads only ever see the [`HostHandle`].

use crate::gate::DispatchGate;
use crate::registry::{HostObjectId, HostRegistry};
use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub(crate) type Job = Box<dyn FnOnce(&Host) + Send>;

static NEXT_HOST_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one host loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostId(u64);

impl HostId {
    fn next() -> Self {
        HostId(NEXT_HOST_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "host-{}", self.0)
    }
}

/// What happened to work handed to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Queued for delivery on the host thread
    Queued,
    /// Dropped because dispatch is disabled or the host is gone
    Dropped,
}

pub(crate) struct HostShared {
    id: HostId,
    queue: Mutex<VecDeque<Job>>,
    ready: Condvar,
    accepting: AtomicBool,
    gate: DispatchGate,
}

impl HostShared {
    /// Queue a job without blocking; rejected jobs are dropped on the caller's thread
    pub(crate) fn schedule(&self, job: Job) -> EnqueueOutcome {
        let rejected = match self.gate.enter() {
            Some(_admitted) if self.accepting.load(Ordering::SeqCst) => {
                self.queue.lock().push_back(job);
                self.ready.notify_one();
                None
            }
            _ => Some(job),
        };

        match rejected {
            Some(job) => {
                drop(job);
                EnqueueOutcome::Dropped
            }
            None => EnqueueOutcome::Queued,
        }
    }

    /// Drop every queued job, returning how many were discarded
    pub(crate) fn purge(&self) -> usize {
        let drained: Vec<Job> = self.queue.lock().drain(..).collect();
        let count = drained.len();
        drop(drained);
        count
    }

    pub(crate) fn id(&self) -> HostId {
        self.id
    }

    fn pop(&self) -> Option<Job> {
        self.queue.lock().pop_front()
    }

    fn pop_or_wait(&self, deadline: Instant) -> Option<Job> {
        let mut queue = self.queue.lock();
        if queue.is_empty() {
            let _ = self.ready.wait_until(&mut queue, deadline);
        }
        queue.pop_front()
    }
}

/// Thread-safe handle used by engine threads to reach the host
#[derive(Clone)]
pub struct HostHandle {
    shared: Arc<HostShared>,
}

impl HostHandle {
    /// Identity of the host this handle schedules onto
    pub fn id(&self) -> HostId {
        self.shared.id
    }

    /// Run `f` on the host thread during a later loop turn
    ///
    /// Never blocks. If dispatch is disabled or the host is gone, `f` is
    /// dropped on the calling thread and [`EnqueueOutcome::Dropped`] is returned.
    pub fn schedule<F>(&self, f: F) -> EnqueueOutcome
    where
        F: FnOnce(&Host) + Send + 'static,
    {
        self.shared.schedule(Box::new(f))
    }

    /// Number of jobs waiting for the host thread
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().len()
    }

    /// Whether the host is still accepting work
    pub fn is_accepting(&self) -> bool {
        self.shared.accepting.load(Ordering::SeqCst) && self.shared.gate.is_enabled()
    }

    pub(crate) fn schedule_job(&self, job: Job) -> EnqueueOutcome {
        self.shared.schedule(job)
    }
}

impl fmt::Debug for HostHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostHandle")
            .field("id", &self.shared.id)
            .field("pending", &self.pending())
            .finish()
    }
}

struct HostInner {
    shared: Arc<HostShared>,
    registry: RefCell<HostRegistry>,
    running: Cell<bool>,
}

impl Drop for HostInner {
    fn drop(&mut self) {
        self.shared.accepting.store(false, Ordering::SeqCst);
        let purged = self.shared.purge();
        if purged > 0 {
            tracing::debug!(host = %self.shared.id, purged, "host dropped with queued deliveries");
        }
    }
}

/// Marks the loop as running; cleared even if a delivery panics
struct RunGuard<'a>(&'a Cell<bool>);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// The single-threaded host loop
///
/// Cloning is cheap and yields another handle to the same loop.
#[derive(Clone)]
pub struct Host {
    inner: Rc<HostInner>,
}

impl Host {
    /// Create a host loop on the current thread, governed by the global gate
    pub fn new() -> Self {
        Self::with_gate(DispatchGate::global().clone())
    }

    /// Create a host loop governed by an explicit gate
    pub fn with_gate(gate: DispatchGate) -> Self {
        let id = HostId::next();
        let shared = Arc::new(HostShared {
            id,
            queue: Mutex::new(VecDeque::new()),
            ready: Condvar::new(),
            accepting: AtomicBool::new(true),
            gate: gate.clone(),
        });
        gate.register_host(&shared);
        tracing::debug!(host = %id, "host loop created");

        Self {
            inner: Rc::new(HostInner {
                shared,
                registry: RefCell::new(HostRegistry::new(id)),
                running: Cell::new(false),
            }),
        }
    }

    pub fn id(&self) -> HostId {
        self.inner.shared.id
    }

    /// Thread-safe handle for engine threads
    pub fn handle(&self) -> HostHandle {
        HostHandle {
            shared: Arc::clone(&self.inner.shared),
        }
    }

    /// The gate this host is governed by
    pub fn gate(&self) -> &DispatchGate {
        &self.inner.shared.gate
    }

    /// Number of deliveries waiting to run
    pub fn pending(&self) -> usize {
        self.inner.shared.queue.lock().len()
    }

    /// Run at most one queued delivery
    pub fn run_once(&self) -> bool {
        let Some(_guard) = self.enter() else {
            return false;
        };
        match self.inner.shared.pop() {
            Some(job) => {
                job(self);
                true
            }
            None => false,
        }
    }

    /// Run deliveries until the queue is empty, including ones queued meanwhile
    pub fn run_until_idle(&self) -> usize {
        let Some(_guard) = self.enter() else {
            return 0;
        };
        let mut ran = 0;
        while let Some(job) = self.inner.shared.pop() {
            job(self);
            ran += 1;
        }
        ran
    }

    /// Run deliveries as they arrive until `timeout` elapses
    pub fn run_for(&self, timeout: Duration) -> usize {
        let Some(_guard) = self.enter() else {
            return 0;
        };
        let deadline = Instant::now() + timeout;
        let mut ran = 0;
        while Instant::now() < deadline {
            if let Some(job) = self.inner.shared.pop_or_wait(deadline) {
                job(self);
                ran += 1;
            }
        }
        ran
    }

    /// Run deliveries until `done` returns true or `timeout` elapses
    ///
    /// Returns the final value of `done`.
    pub fn run_until<F>(&self, timeout: Duration, mut done: F) -> bool
    where
        F: FnMut(&Host) -> bool,
    {
        let Some(_guard) = self.enter() else {
            return done(self);
        };
        let deadline = Instant::now() + timeout;
        loop {
            if done(self) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            if let Some(job) = self.inner.shared.pop_or_wait(deadline) {
                job(self);
            }
        }
    }

    /// Register a host-side value and return its generation-checked id
    pub fn register_value<V: 'static>(&self, value: V) -> HostObjectId {
        self.register_rc(Rc::new(value))
    }

    /// Register an already shared host-side value
    pub fn register_rc(&self, value: Rc<dyn Any>) -> HostObjectId {
        self.inner.registry.borrow_mut().insert(value)
    }

    /// Look up a host-side value; `None` if collected, stale, foreign or of another type
    pub fn resolve<V: 'static>(&self, id: HostObjectId) -> Option<Rc<V>> {
        self.resolve_any(id)?.downcast::<V>().ok()
    }

    pub fn resolve_any(&self, id: HostObjectId) -> Option<Rc<dyn Any>> {
        self.inner.registry.borrow().get(id)
    }

    /// Collect a host-side value, as the host's garbage collector would
    pub fn collect(&self, id: HostObjectId) -> bool {
        let removed = self.inner.registry.borrow_mut().remove(id);
        // Dropped after the registry borrow ends; the value's Drop may touch the host.
        removed.is_some()
    }

    /// Number of registered host-side values
    pub fn live_objects(&self) -> usize {
        self.inner.registry.borrow().len()
    }

    fn enter(&self) -> Option<RunGuard<'_>> {
        if self.inner.running.replace(true) {
            tracing::warn!(host = %self.id(), "nested host loop run refused");
            return None;
        }
        Some(RunGuard(&self.inner.running))
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("id", &self.id())
            .field("pending", &self.pending())
            .field("live_objects", &self.live_objects())
            .finish()
    }
}
