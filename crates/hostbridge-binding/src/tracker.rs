//! Live binding tracking

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global binding tracker
static BINDING_TRACKER: OnceCell<BindingTracker> = OnceCell::new();

/// Identity of one binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(u64);

impl BindingId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "binding-{}", self.0)
    }
}

/// The kind of engine resource a binding bridges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    Connection,
    Stream,
    Client,
    Operation,
}

impl BindingKind {
    pub fn name(&self) -> &'static str {
        match self {
            BindingKind::Connection => "connection",
            BindingKind::Stream => "stream",
            BindingKind::Client => "client",
            BindingKind::Operation => "operation",
        }
    }
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Registry of every binding that has not yet been freed
///
/// Bindings register on creation and unregister from their zero-callback,
/// so anything still listed after teardown and a drained host is a leak.
pub struct BindingTracker {
    live: DashMap<BindingId, BindingKind>,
    next_id: AtomicU64,
}

impl BindingTracker {
    /// Create a new tracker
    pub fn new() -> Self {
        Self {
            live: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Get the global tracker
    pub fn global() -> &'static BindingTracker {
        BINDING_TRACKER.get_or_init(BindingTracker::new)
    }

    /// Register a new binding
    pub fn register(&self, kind: BindingKind) -> BindingId {
        let id = BindingId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.live.insert(id, kind);
        id
    }

    /// Remove a binding; `false` if it was not registered
    pub fn remove(&self, id: BindingId) -> bool {
        self.live.remove(&id).is_some()
    }

    pub fn contains(&self, id: BindingId) -> bool {
        self.live.contains_key(&id)
    }

    pub fn kind_of(&self, id: BindingId) -> Option<BindingKind> {
        self.live.get(&id).map(|entry| *entry.value())
    }

    /// Number of live bindings of every kind
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Number of live bindings of one kind
    pub fn live_of(&self, kind: BindingKind) -> usize {
        self.live.iter().filter(|entry| *entry.value() == kind).count()
    }
}

impl Default for BindingTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracker registration held by a per-operation record; unregisters on drop
pub(crate) struct TrackerTicket {
    id: BindingId,
}

impl TrackerTicket {
    pub(crate) fn issue(kind: BindingKind) -> Self {
        Self {
            id: BindingTracker::global().register(kind),
        }
    }

    pub(crate) fn id(&self) -> BindingId {
        self.id
    }
}

impl Drop for TrackerTicket {
    fn drop(&mut self) {
        BindingTracker::global().remove(self.id);
    }
}
