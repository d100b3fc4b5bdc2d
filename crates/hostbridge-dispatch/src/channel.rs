//! Dispatch channels
//!
//! A [`DispatchChannel`] carries one kind of event from any engine thread
//! to its host thread. Deliveries for a channel run in enqueue order, one
//! at a time, on the host. Each accepted event pins the channel until it
//! has been delivered or discarded; a retired channel is destroyed only
//! once its pin count is back to zero, so no delivery ever observes a
//! destroyed channel.

use crate::host::{EnqueueOutcome, Host, HostHandle};
use hostbridge_core::{BridgeError, BridgeResult};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, AtomicUsize, Ordering};

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

const ACTIVE: u8 = 0;
const DRAINING: u8 = 1;
const DESTROYED: u8 = 2;

/// Identity of one dispatch channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(u64);

impl ChannelId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch-{}", self.0)
    }
}

/// How a channel treats work that is already queued when it is retired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetireMode {
    /// Queued events are still delivered
    Drain,
    /// Queued events are discarded without invoking the delivery function
    Abort,
}

/// Channel lifecycle: `Active -> Draining -> Destroyed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Active,
    Draining,
    Destroyed,
}

impl ChannelState {
    fn from_u8(value: u8) -> Self {
        match value {
            ACTIVE => ChannelState::Active,
            DRAINING => ChannelState::Draining,
            _ => ChannelState::Destroyed,
        }
    }
}

/// Delivery accounting for one channel
///
/// Once the channel is quiescent, `enqueued == delivered + discarded`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    pub enqueued: u64,
    pub delivered: u64,
    pub discarded: u64,
}

type Delivery<P> = Box<dyn FnMut(&Host, P) + Send>;

struct ChannelInner<P> {
    id: ChannelId,
    label: &'static str,
    host: HostHandle,
    state: AtomicU8,
    discard_pending: AtomicBool,
    pins: AtomicUsize,
    enqueued: AtomicU64,
    delivered: AtomicU64,
    discarded: AtomicU64,
    delivery: Mutex<Option<Delivery<P>>>,
}

impl<P> ChannelInner<P> {
    fn state(&self) -> ChannelState {
        ChannelState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn unpin(&self) {
        if self.pins.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.try_destroy();
        }
    }

    fn try_destroy(&self) {
        if self.pins.load(Ordering::SeqCst) != 0 {
            return;
        }
        if self
            .state
            .compare_exchange(DRAINING, DESTROYED, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let delivery = self.delivery.lock().take();
            drop(delivery);
            tracing::trace!(channel = %self.id, label = self.label, "dispatch channel destroyed");
        }
    }
}

/// A pin held by one accepted event until it is delivered or discarded
struct Pin<P> {
    inner: Arc<ChannelInner<P>>,
    delivered: bool,
}

impl<P> Pin<P> {
    fn deliver(mut self, host: &Host, payload: P) {
        let inner = &self.inner;
        assert_eq!(
            host.id(),
            inner.host.id(),
            "dispatch channel delivered on a foreign host"
        );

        if inner.discard_pending.load(Ordering::SeqCst) {
            tracing::debug!(channel = %inner.id, label = inner.label, "delivery discarded after abort");
            drop(payload);
            return;
        }

        let undelivered = {
            let mut delivery = inner.delivery.lock();
            match delivery.as_mut() {
                Some(deliver) => {
                    deliver(host, payload);
                    None
                }
                None => Some(payload),
            }
        };

        match undelivered {
            Some(payload) => drop(payload),
            None => self.delivered = true,
        }
    }
}

impl<P> Drop for Pin<P> {
    fn drop(&mut self) {
        let counter = if self.delivered {
            &self.inner.delivered
        } else {
            &self.inner.discarded
        };
        counter.fetch_add(1, Ordering::SeqCst);
        self.inner.unpin();
    }
}

/// Ordered, non-blocking delivery of `P` events onto one host
pub struct DispatchChannel<P> {
    inner: Arc<ChannelInner<P>>,
}

impl<P> Clone for DispatchChannel<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: Send + 'static> DispatchChannel<P> {
    /// Create a channel whose events are handed to `delivery` on the host thread
    ///
    /// Fails with [`BridgeError::DispatchDisabled`] once the host's gate is disabled.
    pub fn create<F>(host: &Host, label: &'static str, delivery: F) -> BridgeResult<Self>
    where
        F: FnMut(&Host, P) + Send + 'static,
    {
        if !host.gate().is_enabled() {
            tracing::debug!(label, "dispatch disabled, channel not created");
            return Err(BridgeError::DispatchDisabled);
        }

        let id = ChannelId(NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed));
        tracing::trace!(channel = %id, label, host = %host.id(), "dispatch channel created");

        Ok(Self {
            inner: Arc::new(ChannelInner {
                id,
                label,
                host: host.handle(),
                state: AtomicU8::new(ACTIVE),
                discard_pending: AtomicBool::new(false),
                pins: AtomicUsize::new(0),
                enqueued: AtomicU64::new(0),
                delivered: AtomicU64::new(0),
                discarded: AtomicU64::new(0),
                delivery: Mutex::new(Some(Box::new(delivery))),
            }),
        })
    }

    /// Hand an event to the host thread; callable from any thread, never blocks
    ///
    /// Returns `Err(ChannelRetired)` once the channel has been retired. An
    /// accepted event that the host refuses (dispatch disabled, host gone) is
    /// dropped here and reported as [`EnqueueOutcome::Dropped`].
    pub fn enqueue(&self, payload: P) -> BridgeResult<EnqueueOutcome> {
        let inner = &self.inner;

        // Pin before checking state so retire can never destroy under us.
        inner.pins.fetch_add(1, Ordering::SeqCst);
        if inner.state() != ChannelState::Active {
            inner.unpin();
            return Err(BridgeError::ChannelRetired(inner.label.to_string()));
        }

        inner.enqueued.fetch_add(1, Ordering::SeqCst);
        let pin = Pin {
            inner: Arc::clone(inner),
            delivered: false,
        };
        let outcome = inner
            .host
            .schedule_job(Box::new(move |host: &Host| pin.deliver(host, payload)));

        if outcome == EnqueueOutcome::Dropped {
            tracing::debug!(channel = %inner.id, label = inner.label, "event dropped, host not accepting");
        }
        Ok(outcome)
    }

    /// Retire the channel
    ///
    /// No-op (returns `false`) unless the channel is still active.
    pub fn retire(&self, mode: RetireMode) -> bool {
        let inner = &self.inner;
        if inner
            .state
            .compare_exchange(ACTIVE, DRAINING, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        if mode == RetireMode::Abort {
            inner.discard_pending.store(true, Ordering::SeqCst);
        }
        tracing::trace!(
            channel = %inner.id,
            label = inner.label,
            ?mode,
            pins = inner.pins.load(Ordering::SeqCst),
            "dispatch channel retired"
        );
        inner.try_destroy();
        true
    }

    pub fn id(&self) -> ChannelId {
        self.inner.id
    }

    pub fn label(&self) -> &'static str {
        self.inner.label
    }

    pub fn state(&self) -> ChannelState {
        self.inner.state()
    }

    pub fn is_retired(&self) -> bool {
        self.state() != ChannelState::Active
    }

    /// Events accepted but not yet delivered or discarded
    pub fn pins(&self) -> usize {
        self.inner.pins.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> ChannelStats {
        ChannelStats {
            enqueued: self.inner.enqueued.load(Ordering::SeqCst),
            delivered: self.inner.delivered.load(Ordering::SeqCst),
            discarded: self.inner.discarded.load(Ordering::SeqCst),
        }
    }
}

impl<P> fmt::Debug for DispatchChannel<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchChannel")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .field("state", &self.inner.state())
            .field("pins", &self.inner.pins.load(Ordering::SeqCst))
            .finish()
    }
}

/// Type-erased retirement, so one binding can own channels of several payload types
pub trait Retire: Send + Sync {
    fn channel_id(&self) -> ChannelId;

    fn label(&self) -> &'static str;

    fn retire(&self, mode: RetireMode) -> bool;

    fn state(&self) -> ChannelState;
}

impl<P: Send + 'static> Retire for DispatchChannel<P> {
    fn channel_id(&self) -> ChannelId {
        self.id()
    }

    fn label(&self) -> &'static str {
        DispatchChannel::label(self)
    }

    fn retire(&self, mode: RetireMode) -> bool {
        DispatchChannel::retire(self, mode)
    }

    fn state(&self) -> ChannelState {
        DispatchChannel::state(self)
    }
}
