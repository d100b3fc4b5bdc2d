//! Process-wide dispatch gate
//!
//! Every enqueue runs under the gate's read lock. [`DispatchGate::disable`]
//! takes the write lock, so once it returns no enqueue is in progress and
//! every later one is refused.

use crate::host::HostShared;
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

static GLOBAL_GATE: OnceCell<DispatchGate> = OnceCell::new();

struct GateInner {
    enabled: AtomicBool,
    lock: RwLock<()>,
    hosts: Mutex<Vec<Weak<HostShared>>>,
}

/// Enable/disable switch shared by a set of hosts
#[derive(Clone)]
pub struct DispatchGate {
    inner: Arc<GateInner>,
}

impl DispatchGate {
    /// Create an independent, enabled gate
    pub fn new() -> Self {
        Self {
            inner: Arc::new(GateInner {
                enabled: AtomicBool::new(true),
                lock: RwLock::new(()),
                hosts: Mutex::new(Vec::new()),
            }),
        }
    }

    /// The process-wide gate used by [`Host::new`](crate::Host::new)
    pub fn global() -> &'static DispatchGate {
        GLOBAL_GATE.get_or_init(DispatchGate::new)
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst)
    }

    /// Disable dispatch for every host governed by this gate
    ///
    /// Purges all queued deliveries without touching any host thread.
    /// Returns `true` only for the call that actually disabled the gate.
    pub fn disable(&self) -> bool {
        let first = {
            let _exclusive = self.inner.lock.write();
            self.inner.enabled.swap(false, Ordering::SeqCst)
        };
        if !first {
            return false;
        }

        let hosts: Vec<Arc<HostShared>> = self
            .inner
            .hosts
            .lock()
            .drain(..)
            .filter_map(|host| host.upgrade())
            .collect();

        let mut purged = 0;
        for host in &hosts {
            let count = host.purge();
            if count > 0 {
                tracing::debug!(host = %host.id(), count, "purged queued deliveries");
            }
            purged += count;
        }
        tracing::info!(hosts = hosts.len(), purged, "dispatch disabled");
        true
    }

    pub fn ptr_eq(&self, other: &DispatchGate) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Admit one enqueue; `None` once the gate is disabled
    pub(crate) fn enter(&self) -> Option<RwLockReadGuard<'_, ()>> {
        let guard = self.inner.lock.read();
        self.is_enabled().then_some(guard)
    }

    pub(crate) fn register_host(&self, host: &Arc<HostShared>) {
        let mut hosts = self.inner.hosts.lock();
        hosts.retain(|existing| existing.strong_count() > 0);
        hosts.push(Arc::downgrade(host));
    }
}

impl Default for DispatchGate {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DispatchGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchGate")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
