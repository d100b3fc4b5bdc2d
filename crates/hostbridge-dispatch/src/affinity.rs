//! Thread-affinity wrapper for host-only state

use crate::host::{Host, HostId};
use parking_lot::Mutex;
use std::fmt;

/// A value that may only be accessed on its owning host thread
///
/// The cell itself is `Send + Sync` so it can sit inside shared native
/// state, but [`HostCell::with`] demands a `&Host` of the owning host.
/// Using it with any other host is an invariant violation and panics.
pub struct HostCell<T> {
    owner: HostId,
    value: Mutex<T>,
}

impl<T> HostCell<T> {
    pub fn new(host: &Host, value: T) -> Self {
        Self {
            owner: host.id(),
            value: Mutex::new(value),
        }
    }

    pub fn owner(&self) -> HostId {
        self.owner
    }

    /// Run `f` with exclusive access to the value on the owning host thread
    ///
    /// # Panics
    ///
    /// If `host` is not the owning host, or if `f` re-enters this cell.
    pub fn with<R>(&self, host: &Host, f: impl FnOnce(&mut T) -> R) -> R {
        assert_eq!(
            host.id(),
            self.owner,
            "host-affine value used from a foreign host"
        );
        let mut guard = match self.value.try_lock() {
            Some(guard) => guard,
            None => panic!("host-affine value re-entered on {}", self.owner),
        };
        f(&mut guard)
    }

    /// Exclusive access without a host; only possible once nothing else can reach the cell
    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }

    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T> fmt::Debug for HostCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostCell").field("owner", &self.owner).finish()
    }
}
