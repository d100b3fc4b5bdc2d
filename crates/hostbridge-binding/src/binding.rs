//! Binding composite and teardown path
//!
//! A [`Binding`] bridges one engine resource to one host-visible value. It
//! is reference counted: the wrapper holds the allocation reference, every
//! queued event record holds one, every in-flight operation holds one, and
//! the engine interval (from the first engine request until the engine's
//! terminal callback) holds one through a [`CompletionLatch`].
//!
//! All mutable state lives in a [`HostCell`], so it is only ever touched on
//! the host thread. Explicit close, wrapper finalization and engine-driven
//! shutdown all converge on [`Binding::teardown`].

use crate::tracker::{BindingId, BindingKind, BindingTracker};
use hostbridge_core::{BindingState, BridgeError, BridgeResult, CompletionLatch, RefHandle};
use hostbridge_dispatch::{
    ChannelState, Host, HostCell, HostObjectId, Retire, RetireMode, WeakHostRef,
};
use std::cell::RefCell;
use std::fmt;
use std::mem;
use std::rc::Rc;
use std::sync::Arc;

/// Latch holding the engine-interval reference
pub(crate) type IntervalLatch<H> = Arc<CompletionLatch<Binding<H>>>;

/// An event captured on an engine thread, carrying its own binding reference
pub(crate) struct EventRecord<H: Send + 'static, P> {
    pub(crate) binding: Binding<H>,
    pub(crate) payload: P,
}

pub(crate) struct BindingCore<H: Send + 'static> {
    pub(crate) state: BindingState,
    pub(crate) closed: bool,
    pub(crate) native: Option<H>,
    wrapper: WeakHostRef,
    channels: Vec<Box<dyn Retire>>,
    interval: Option<IntervalLatch<H>>,
}

impl<H: Send + 'static> BindingCore<H> {
    pub(crate) fn transition(&mut self, target: BindingState) -> BridgeResult<()> {
        if !self.state.can_transition_to(target) {
            return Err(BridgeError::InvalidState {
                expected: format!("a state that can become {target}"),
                actual: self.state.to_string(),
            });
        }
        self.state = target;
        Ok(())
    }

    /// Require the exact `state`, reporting a closed binding as such
    pub(crate) fn expect_state(&self, state: BindingState, kind: BindingKind) -> BridgeResult<()> {
        if self.closed {
            return Err(BridgeError::closed(kind.name()));
        }
        if self.state != state {
            return Err(BridgeError::InvalidState {
                expected: format!("{state} {kind}"),
                actual: self.state.to_string(),
            });
        }
        Ok(())
    }

    pub(crate) fn expect_operational(&self, kind: BindingKind) -> BridgeResult<()> {
        self.expect_state(BindingState::Operational, kind)
    }

    pub(crate) fn expect_open(&self, kind: BindingKind) -> BridgeResult<()> {
        if self.closed || !self.state.is_open() {
            return Err(BridgeError::closed(kind.name()));
        }
        Ok(())
    }
}

pub(crate) struct BindingInner<H: Send + 'static> {
    id: BindingId,
    kind: BindingKind,
    core: HostCell<BindingCore<H>>,
}

/// Reference-counted bridge between one engine resource and one host value
pub struct Binding<H: Send + 'static> {
    handle: RefHandle<BindingInner<H>>,
}

impl<H: Send + 'static> Binding<H> {
    /// Create a binding for the host value `wrapper`, holding one reference
    pub(crate) fn new(host: &Host, kind: BindingKind, wrapper: HostObjectId) -> Self {
        let id = BindingTracker::global().register(kind);
        let core = BindingCore {
            state: BindingState::Created,
            closed: false,
            native: None,
            wrapper: WeakHostRef::new(wrapper),
            channels: Vec::new(),
            interval: None,
        };
        let inner = BindingInner {
            id,
            kind,
            core: HostCell::new(host, core),
        };
        tracing::debug!(binding = %id, %kind, "binding created");

        Self {
            handle: RefHandle::with_zero_callback(inner, free_binding),
        }
    }

    pub fn id(&self) -> BindingId {
        self.handle.id
    }

    pub fn kind(&self) -> BindingKind {
        self.handle.kind
    }

    /// Number of live references to this binding
    pub fn ref_count(&self) -> usize {
        self.handle.ref_count()
    }

    pub fn state(&self, host: &Host) -> BindingState {
        self.with_core(host, |core| core.state)
    }

    pub fn is_closed(&self, host: &Host) -> bool {
        self.with_core(host, |core| core.closed)
    }

    /// Channels attached and not yet destroyed
    pub fn channel_count(&self, host: &Host) -> usize {
        self.with_core(host, |core| {
            core.channels
                .iter()
                .filter(|channel| channel.state() != ChannelState::Destroyed)
                .count()
        })
    }

    pub(crate) fn acquire(&self) -> Self {
        Self {
            handle: self.handle.acquire(),
        }
    }

    pub(crate) fn with_core<R>(&self, host: &Host, f: impl FnOnce(&mut BindingCore<H>) -> R) -> R {
        self.handle.core.with(host, f)
    }

    /// Resolve the host value; `None` once revoked or collected
    pub(crate) fn resolve<V: 'static>(&self, host: &Host) -> Option<Rc<V>> {
        let target = self.with_core(host, |core| core.wrapper.target())?;
        host.resolve(target)
    }

    /// Attach a channel so teardown retires it; drops destroyed ones
    pub(crate) fn attach(&self, host: &Host, channel: Box<dyn Retire>) {
        self.with_core(host, |core| {
            core.channels
                .retain(|existing| existing.state() != ChannelState::Destroyed);
            core.channels.push(channel);
        });
    }

    /// Acquire the engine-interval reference and hand out its latch
    pub(crate) fn arm_interval(&self, host: &Host) -> IntervalLatch<H> {
        let latch = Arc::new(CompletionLatch::new(self.acquire()));
        self.with_core(host, |core| core.interval = Some(Arc::clone(&latch)));
        latch
    }

    /// Run the teardown path; returns `false` if it already ran
    ///
    /// Marks the binding closed, revokes the host reference, retires every
    /// channel with `mode`, releases the engine-interval reference directly
    /// and releases the engine handle. Safe to call when the engine handle
    /// was never created.
    pub fn teardown(&self, host: &Host, mode: RetireMode) -> bool {
        let released = self.with_core(host, |core| {
            if core.closed {
                return None;
            }
            core.closed = true;
            if core.state.is_open() {
                core.state = BindingState::ShuttingDown;
            }
            core.wrapper.clear();
            let channels = mem::take(&mut core.channels);
            let interval = core.interval.take();
            let native = core.native.take();
            core.state = BindingState::Closed;
            Some((channels, interval, native))
        });
        let Some((channels, interval, native)) = released else {
            return false;
        };

        let retired = channels
            .iter()
            .filter(|channel| channel.retire(mode))
            .count();
        let interval_ref = interval.and_then(|latch| latch.release());
        let had_interval = interval_ref.is_some();
        drop(interval_ref);
        drop(native);

        tracing::debug!(
            binding = %self.id(),
            kind = %self.kind(),
            ?mode,
            retired,
            had_interval,
            "binding torn down"
        );
        true
    }
}

impl<H: Send + 'static> Clone for Binding<H> {
    fn clone(&self) -> Self {
        self.acquire()
    }
}

impl<H: Send + 'static> fmt::Debug for Binding<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .field("ref_count", &self.ref_count())
            .finish()
    }
}

/// Zero-callback: runs on whichever thread released the last reference
fn free_binding<H: Send + 'static>(inner: &mut BindingInner<H>) {
    BindingTracker::global().remove(inner.id);
    let core = inner.core.get_mut();
    let orphaned = mem::take(&mut core.channels);
    for channel in &orphaned {
        channel.retire(RetireMode::Abort);
    }
    debug_assert!(
        core.native.is_none(),
        "binding {} freed while still holding its engine handle",
        inner.id
    );
    tracing::trace!(binding = %inner.id, kind = %inner.kind, "binding freed");
}

/// The wrapper's allocation reference, confined to the host thread
///
/// Dropping the owner is the finalizer path: it runs teardown if an
/// explicit close did not, and unregisters the host value.
pub(crate) struct BindingOwner<H: Send + 'static> {
    host: Host,
    kind: BindingKind,
    value: HostObjectId,
    binding: RefCell<Option<Binding<H>>>,
}

impl<H: Send + 'static> BindingOwner<H> {
    pub(crate) fn new<V: 'static>(host: &Host, kind: BindingKind, value: V) -> Self {
        let value = host.register_value(value);
        Self {
            host: host.clone(),
            kind,
            value,
            binding: RefCell::new(Some(Binding::new(host, kind, value))),
        }
    }

    /// Acquire a reference for one operation; fails once closed
    pub(crate) fn binding(&self) -> BridgeResult<Binding<H>> {
        self.binding
            .borrow()
            .as_ref()
            .map(Binding::acquire)
            .ok_or_else(|| BridgeError::closed(self.kind.name()))
    }

    pub(crate) fn binding_id(&self) -> Option<BindingId> {
        self.binding.borrow().as_ref().map(Binding::id)
    }

    pub(crate) fn value(&self) -> HostObjectId {
        self.value
    }

    pub(crate) fn state(&self, host: &Host) -> BindingState {
        match self.binding() {
            Ok(binding) => binding.state(host),
            Err(_) => BindingState::Closed,
        }
    }

    pub(crate) fn is_closed(&self, host: &Host) -> bool {
        match self.binding() {
            Ok(binding) => binding.is_closed(host),
            Err(_) => true,
        }
    }

    /// Tear down in abort mode and release the allocation reference
    pub(crate) fn close(&self) -> bool {
        let Some(binding) = self.binding.borrow_mut().take() else {
            return false;
        };
        binding.teardown(&self.host, RetireMode::Abort);
        drop(binding);
        true
    }
}

impl<H: Send + 'static> Drop for BindingOwner<H> {
    fn drop(&mut self) {
        if self.close() {
            tracing::trace!(kind = %self.kind, "binding finalized without explicit close");
        }
        self.host.collect(self.value);
    }
}

#[cfg(test)]
#[path = "binding/binding_tests.rs"]
mod binding_tests;
