//! Revocable references from native code back to host values

use crate::host::Host;
use crate::registry::HostObjectId;
use std::any::Any;
use std::rc::Rc;

/// Non-owning reference to a host-side value
///
/// Holds only an id, so it is `Send` and can live inside native state.
/// Resolution needs a `&Host`, which confines it to the host thread.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct WeakHostRef {
    target: Option<HostObjectId>,
}

impl WeakHostRef {
    pub fn new(target: HostObjectId) -> Self {
        Self {
            target: Some(target),
        }
    }

    /// A reference that never resolves
    pub fn empty() -> Self {
        Self { target: None }
    }

    pub fn target(&self) -> Option<HostObjectId> {
        self.target
    }

    /// Resolve to the host value; `None` if revoked, collected or of another type
    pub fn resolve<V: 'static>(&self, host: &Host) -> Option<Rc<V>> {
        host.resolve(self.target?)
    }

    pub fn resolve_any(&self, host: &Host) -> Option<Rc<dyn Any>> {
        host.resolve_any(self.target?)
    }

    /// Revoke the reference; returns `true` only the first time
    pub fn clear(&mut self) -> bool {
        self.target.take().is_some()
    }

    pub fn is_cleared(&self) -> bool {
        self.target.is_none()
    }
}
