//! Long-lived client lifecycle coordinator

use crate::binding::{Binding, BindingOwner, EventRecord};
use crate::engine::{ClientEngine, ClientLifecycle};
use crate::native::{NativeHandle, Releaser};
use crate::operation;
use crate::sinks::{ClientSink, PublishEvent};
use crate::tracker::{BindingId, BindingKind};
use hostbridge_core::{BindingOptions, BindingState, BridgeError, BridgeResult};
use hostbridge_dispatch::{DispatchChannel, Host, HostObjectId, RetireMode};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

const KIND: BindingKind = BindingKind::Client;

type LifecycleFn<V> = Box<dyn FnMut(&Host, &V, ClientLifecycle) + Send>;
type PublishFn<V> = Box<dyn FnMut(&Host, &V, PublishEvent) + Send>;

/// Host-side callbacks for one client
pub struct ClientCallbacks<V> {
    on_lifecycle: LifecycleFn<V>,
    on_publish: PublishFn<V>,
}

impl<V: 'static> ClientCallbacks<V> {
    pub fn new() -> Self {
        Self {
            on_lifecycle: Box::new(|_, _, _| {}),
            on_publish: Box::new(|_, _, _| {}),
        }
    }

    pub fn on_lifecycle<F>(mut self, f: F) -> Self
    where
        F: FnMut(&Host, &V, ClientLifecycle) + Send + 'static,
    {
        self.on_lifecycle = Box::new(f);
        self
    }

    /// Called for every publish received on a subscribed topic
    pub fn on_publish<F>(mut self, f: F) -> Self
    where
        F: FnMut(&Host, &V, PublishEvent) + Send + 'static,
    {
        self.on_publish = Box::new(f);
        self
    }
}

impl<V: 'static> Default for ClientCallbacks<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Host-visible publish/subscribe client
///
/// The engine client exists from `create` until close or finalization;
/// `start` and `stop` only drive its connection.
pub struct Client<E: ClientEngine, V: 'static> {
    owner: BindingOwner<NativeHandle<E::Client>>,
    engine: Arc<E>,
    _value: PhantomData<fn(&V)>,
}

impl<E: ClientEngine, V: 'static> Client<E, V> {
    pub fn create(
        host: &Host,
        engine: Arc<E>,
        options: BindingOptions,
        callbacks: ClientCallbacks<V>,
        value: V,
    ) -> BridgeResult<Self> {
        let owner = BindingOwner::new(host, KIND, value);
        let binding = owner.binding()?;

        let ClientCallbacks {
            on_lifecycle,
            on_publish,
        } = callbacks;
        let lifecycle =
            DispatchChannel::create(host, "client.lifecycle", deliver_lifecycle(on_lifecycle))?;
        let publish = DispatchChannel::create(host, "client.publish", deliver_publish(on_publish))?;
        let terminated = DispatchChannel::create(host, "client.terminated", deliver_terminated)?;
        binding.attach(host, Box::new(lifecycle.clone()));
        binding.attach(host, Box::new(publish.clone()));
        binding.attach(host, Box::new(terminated.clone()));

        let latch = binding.arm_interval(host);
        let sink = ClientSink::new(latch, lifecycle, publish, terminated);
        let client = match engine.new_client(&options, sink) {
            Ok(client) => client,
            Err(error) => {
                // No engine client exists, so nothing will ever report
                // termination; dropping the owner releases everything directly.
                tracing::warn!(binding = %binding.id(), %error, "engine refused to create client");
                return Err(BridgeError::ConstructionFailed(error.to_string()));
            }
        };

        let native = NativeHandle::new(client, releaser(&engine));
        binding.with_core(host, |core| core.native = Some(native));
        tracing::debug!(binding = %binding.id(), label = %options.label, "client created");

        Ok(Self {
            engine,
            owner,
            _value: PhantomData,
        })
    }

    /// Start connecting; progress arrives as lifecycle events
    pub fn start(&self, host: &Host) -> BridgeResult<()> {
        let binding = self.owner.binding()?;
        binding.with_core(host, |core| {
            core.expect_state(BindingState::Created, KIND)?;
            let started = match core.native.as_ref().and_then(NativeHandle::get) {
                Some(client) => self.engine.start(client).map_err(BridgeError::from),
                None => Err(BridgeError::Internal("client has no engine handle".to_string())),
            };
            started?;
            core.transition(BindingState::Connecting)
        })
    }

    /// Stop the client; [`ClientLifecycle::Stopped`] follows
    pub fn stop(&self, host: &Host) -> BridgeResult<()> {
        let binding = self.owner.binding()?;
        binding.with_core(host, |core| {
            core.expect_open(KIND)?;
            match core.native.as_ref().and_then(NativeHandle::get) {
                Some(client) => self.engine.stop(client).map_err(BridgeError::from),
                None => Err(BridgeError::Internal("client has no engine handle".to_string())),
            }
        })
    }

    pub fn publish<F>(&self, host: &Host, topic: &str, payload: &[u8], on_complete: F) -> BridgeResult<()>
    where
        F: FnOnce(&Host, &V, BridgeResult<Vec<u8>>) + Send + 'static,
    {
        let binding = self.owner.binding()?;
        binding.with_core(host, |core| core.expect_operational(KIND))?;
        let sink = operation::start(host, &binding, "client.publish", on_complete)?;
        self.with_client(host, &binding, |engine, client| {
            engine.publish(client, topic, payload, sink)
        })
    }

    pub fn subscribe<F>(&self, host: &Host, topic: &str, on_complete: F) -> BridgeResult<()>
    where
        F: FnOnce(&Host, &V, BridgeResult<Vec<u8>>) + Send + 'static,
    {
        let binding = self.owner.binding()?;
        binding.with_core(host, |core| core.expect_operational(KIND))?;
        let sink = operation::start(host, &binding, "client.subscribe", on_complete)?;
        self.with_client(host, &binding, |engine, client| engine.subscribe(client, topic, sink))
    }

    /// Close the client; later calls have no effect
    pub fn close(&self, host: &Host) {
        debug_assert_eq!(host.id(), self.host_object().host());
        if self.owner.close() {
            tracing::debug!("client closed");
        }
    }

    pub fn state(&self, host: &Host) -> BindingState {
        self.owner.state(host)
    }

    pub fn is_closed(&self, host: &Host) -> bool {
        self.owner.is_closed(host)
    }

    pub fn host_object(&self) -> HostObjectId {
        self.owner.value()
    }

    pub fn binding_id(&self) -> Option<BindingId> {
        self.owner.binding_id()
    }

    fn with_client<F>(&self, host: &Host, binding: &Binding<NativeHandle<E::Client>>, f: F) -> BridgeResult<()>
    where
        F: FnOnce(&E, &E::Client) -> Result<(), hostbridge_core::EngineError>,
    {
        binding.with_core(host, |core| {
            match core.native.as_ref().and_then(NativeHandle::get) {
                Some(client) => f(&self.engine, client).map_err(BridgeError::from),
                None => Err(BridgeError::Internal("client has no engine handle".to_string())),
            }
        })
    }
}

impl<E: ClientEngine, V: 'static> fmt::Debug for Client<E, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("binding", &self.owner.binding_id())
            .finish()
    }
}

fn releaser<E: ClientEngine>(engine: &Arc<E>) -> Releaser<E::Client> {
    let engine = Arc::downgrade(engine);
    Arc::new(move |client: E::Client| match engine.upgrade() {
        Some(engine) => engine.release_client(client),
        None => drop(client),
    })
}

/// State a lifecycle event moves an open client to, if any
fn next_state(current: BindingState, event: ClientLifecycle) -> Option<BindingState> {
    use BindingState::*;
    let target = match event {
        ClientLifecycle::AttemptingConnect if current == Created => Connecting,
        ClientLifecycle::ConnectionSuccess => Operational,
        ClientLifecycle::Disconnection { .. } => Connecting,
        ClientLifecycle::Stopped => Created,
        _ => return None,
    };
    (target != current && current.can_transition_to(target)).then_some(target)
}

fn deliver_lifecycle<Cl: Send + 'static, V: 'static>(
    mut on_lifecycle: LifecycleFn<V>,
) -> impl FnMut(&Host, EventRecord<NativeHandle<Cl>, ClientLifecycle>) + Send + 'static {
    move |host: &Host, record: EventRecord<NativeHandle<Cl>, ClientLifecycle>| {
        let EventRecord { binding, payload: event } = record;
        let moved = binding.with_core(host, |core| {
            if core.closed {
                return None;
            }
            let target = next_state(core.state, event);
            if let Some(target) = target {
                core.state = target;
            }
            Some(target)
        });
        let Some(target) = moved else {
            tracing::debug!(binding = %binding.id(), ?event, "lifecycle event after close discarded");
            return;
        };
        tracing::debug!(binding = %binding.id(), ?event, ?target, "client lifecycle");

        match binding.resolve::<V>(host) {
            Some(value) => on_lifecycle(host, &value, event),
            None => tracing::debug!(binding = %binding.id(), "host value gone, lifecycle event discarded"),
        }
    }
}

fn deliver_publish<Cl: Send + 'static, V: 'static>(
    mut on_publish: PublishFn<V>,
) -> impl FnMut(&Host, EventRecord<NativeHandle<Cl>, PublishEvent>) + Send + 'static {
    move |host: &Host, record: EventRecord<NativeHandle<Cl>, PublishEvent>| {
        let EventRecord { binding, payload } = record;
        if binding.is_closed(host) {
            return;
        }
        match binding.resolve::<V>(host) {
            Some(value) => on_publish(host, &value, payload),
            None => tracing::debug!(binding = %binding.id(), "host value gone, publish discarded"),
        }
    }
}

fn deliver_terminated<Cl: Send + 'static>(host: &Host, record: EventRecord<NativeHandle<Cl>, ()>) {
    let binding = record.binding;
    if binding.teardown(host, RetireMode::Drain) {
        tracing::debug!(binding = %binding.id(), "client terminated by engine");
    }
}
