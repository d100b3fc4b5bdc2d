//! Connection lifecycle coordinator

use crate::binding::{Binding, BindingOwner, EventRecord};
use crate::engine::ConnectionEngine;
use crate::native::{NativeHandle, Releaser};
use crate::operation;
use crate::sinks::{ConnectionSink, SetupEvent};
use crate::tracker::{BindingId, BindingKind};
use hostbridge_core::{BindingOptions, BindingState, BridgeError, BridgeResult, ERROR_CODE_SUCCESS};
use hostbridge_dispatch::{DispatchChannel, Host, HostObjectId, RetireMode};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

const KIND: BindingKind = BindingKind::Connection;

pub(crate) type ConnectionBinding<C> = Binding<NativeHandle<C>>;

type SetupFn<V> = Box<dyn FnMut(&Host, &V, BridgeResult<()>) + Send>;
type ShutdownFn<V> = Box<dyn FnMut(&Host, &V, i32) + Send>;
type MessageFn<V> = Box<dyn FnMut(&Host, &V, Vec<u8>) + Send>;

/// Host-side callbacks for one connection
///
/// Each callback receives the host value registered with the connection.
pub struct ConnectionCallbacks<V> {
    on_setup: SetupFn<V>,
    on_shutdown: ShutdownFn<V>,
    on_message: MessageFn<V>,
}

impl<V: 'static> ConnectionCallbacks<V> {
    pub fn new() -> Self {
        Self {
            on_setup: Box::new(|_, _, _| {}),
            on_shutdown: Box::new(|_, _, _| {}),
            on_message: Box::new(|_, _, _| {}),
        }
    }

    /// Called once setup succeeds or fails; a failed setup ends the connection
    pub fn on_setup<F>(mut self, f: F) -> Self
    where
        F: FnMut(&Host, &V, BridgeResult<()>) + Send + 'static,
    {
        self.on_setup = Box::new(f);
        self
    }

    /// Called once when the engine shuts an established connection down
    pub fn on_shutdown<F>(mut self, f: F) -> Self
    where
        F: FnMut(&Host, &V, i32) + Send + 'static,
    {
        self.on_shutdown = Box::new(f);
        self
    }

    pub fn on_message<F>(mut self, f: F) -> Self
    where
        F: FnMut(&Host, &V, Vec<u8>) + Send + 'static,
    {
        self.on_message = Box::new(f);
        self
    }
}

impl<V: 'static> Default for ConnectionCallbacks<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Host-visible connection backed by an engine connection
///
/// Dropping it without [`close`](Connection::close) is the finalizer path.
pub struct Connection<E: ConnectionEngine, V: 'static> {
    // Dropped first, so finalization can still hand the handle back to the engine.
    owner: BindingOwner<NativeHandle<E::Connection>>,
    engine: Arc<E>,
    options: BindingOptions,
    _value: PhantomData<fn(&V)>,
}

impl<E: ConnectionEngine, V: 'static> Connection<E, V> {
    /// Register `value` with the host and allocate the connection's binding
    pub fn create(host: &Host, engine: Arc<E>, options: BindingOptions, value: V) -> BridgeResult<Self> {
        if !host.gate().is_enabled() {
            return Err(BridgeError::DispatchDisabled);
        }
        Ok(Self {
            engine,
            options,
            owner: BindingOwner::new(host, KIND, value),
            _value: PhantomData,
        })
    }

    /// Ask the engine to connect; setup is reported through `callbacks`
    pub fn connect(&self, host: &Host, callbacks: ConnectionCallbacks<V>) -> BridgeResult<()> {
        let binding = self.owner.binding()?;
        binding.with_core(host, |core| core.expect_state(BindingState::Created, KIND))?;

        let ConnectionCallbacks {
            on_setup,
            on_shutdown,
            on_message,
        } = callbacks;
        let setup = DispatchChannel::create(host, "connection.setup", deliver_setup(on_setup))?;
        let shutdown =
            DispatchChannel::create(host, "connection.shutdown", deliver_shutdown(on_shutdown))?;
        let message =
            DispatchChannel::create(host, "connection.message", deliver_message(on_message))?;
        binding.attach(host, Box::new(setup.clone()));
        binding.attach(host, Box::new(shutdown.clone()));
        binding.attach(host, Box::new(message.clone()));

        binding.with_core(host, |core| core.transition(BindingState::Connecting))?;
        let latch = binding.arm_interval(host);
        let sink = ConnectionSink::new(latch, setup, shutdown, message, releaser(&self.engine));

        if let Err(error) = self.engine.connect(&self.options, sink) {
            tracing::warn!(binding = %binding.id(), %error, "engine rejected connect");
            binding.teardown(host, RetireMode::Abort);
            return Err(error.into());
        }
        tracing::debug!(binding = %binding.id(), label = %self.options.label, "connect requested");
        Ok(())
    }

    /// Send a payload on an operational connection
    pub fn send<F>(&self, host: &Host, payload: &[u8], on_complete: F) -> BridgeResult<()>
    where
        F: FnOnce(&Host, &V, BridgeResult<Vec<u8>>) + Send + 'static,
    {
        let binding = self.owner.binding()?;
        binding.with_core(host, |core| core.expect_operational(KIND))?;
        let sink = operation::start(host, &binding, "connection.send", on_complete)?;

        binding.with_core(host, |core| {
            match core.native.as_ref().and_then(NativeHandle::get) {
                Some(connection) => self.engine.send(connection, payload, sink).map_err(BridgeError::from),
                None => Err(BridgeError::Internal(
                    "operational connection has no engine handle".to_string(),
                )),
            }
        })
    }

    /// Close the connection; later calls have no effect
    pub fn close(&self, host: &Host) {
        debug_assert_eq!(host.id(), self.host_object().host());
        if self.owner.close() {
            tracing::debug!(label = %self.options.label, "connection closed");
        }
    }

    pub fn state(&self, host: &Host) -> BindingState {
        self.owner.state(host)
    }

    pub fn is_closed(&self, host: &Host) -> bool {
        self.owner.is_closed(host)
    }

    /// Id of the registered host value
    pub fn host_object(&self) -> HostObjectId {
        self.owner.value()
    }

    /// Id of the binding, until the connection is closed
    pub fn binding_id(&self) -> Option<BindingId> {
        self.owner.binding_id()
    }

    pub fn options(&self) -> &BindingOptions {
        &self.options
    }

    pub(crate) fn binding(&self) -> BridgeResult<ConnectionBinding<E::Connection>> {
        self.owner.binding()
    }

    pub(crate) fn engine(&self) -> &Arc<E> {
        &self.engine
    }
}

impl<E: ConnectionEngine, V: 'static> fmt::Debug for Connection<E, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("label", &self.options.label)
            .field("binding", &self.owner.binding_id())
            .finish()
    }
}

fn releaser<E: ConnectionEngine>(engine: &Arc<E>) -> Releaser<E::Connection> {
    let engine = Arc::downgrade(engine);
    Arc::new(move |connection: E::Connection| match engine.upgrade() {
        Some(engine) => engine.release_connection(connection),
        None => drop(connection),
    })
}

fn deliver_setup<C: Send + 'static, V: 'static>(
    mut on_setup: SetupFn<V>,
) -> impl FnMut(&Host, EventRecord<NativeHandle<C>, SetupEvent<C>>) + Send + 'static {
    move |host: &Host, record: EventRecord<NativeHandle<C>, SetupEvent<C>>| {
        let EventRecord { binding, payload } = record;
        let SetupEvent { handle, code } = payload;

        let (accepted, leftover) = binding.with_core(host, |core| {
            if core.closed {
                return (None, handle);
            }
            match handle {
                Some(handle) if code == ERROR_CODE_SUCCESS => {
                    core.native = Some(handle);
                    core.state = BindingState::Operational;
                    (Some(true), None)
                }
                handle => {
                    core.state = BindingState::ShuttingDown;
                    (Some(false), handle)
                }
            }
        });
        // Released outside the core lock.
        drop(leftover);

        let Some(succeeded) = accepted else {
            tracing::debug!(binding = %binding.id(), "setup after close discarded");
            return;
        };
        let value = binding.resolve::<V>(host);
        let result = if succeeded {
            tracing::debug!(binding = %binding.id(), "connection established");
            Ok(())
        } else {
            tracing::warn!(binding = %binding.id(), code, "connection setup failed");
            binding.teardown(host, RetireMode::Drain);
            if code == ERROR_CODE_SUCCESS {
                Err(BridgeError::Internal(
                    "setup reported success without a handle".to_string(),
                ))
            } else {
                Err(BridgeError::Engine {
                    code,
                    message: "connection setup failed".to_string(),
                })
            }
        };
        match value {
            Some(value) => on_setup(host, &value, result),
            None => tracing::debug!(binding = %binding.id(), "host value gone, setup discarded"),
        }
    }
}

fn deliver_shutdown<C: Send + 'static, V: 'static>(
    mut on_shutdown: ShutdownFn<V>,
) -> impl FnMut(&Host, EventRecord<NativeHandle<C>, i32>) + Send + 'static {
    move |host: &Host, record: EventRecord<NativeHandle<C>, i32>| {
        let EventRecord { binding, payload: code } = record;
        if binding.is_closed(host) {
            tracing::debug!(binding = %binding.id(), "shutdown after close discarded");
            return;
        }
        let value = binding.resolve::<V>(host);
        binding.teardown(host, RetireMode::Drain);
        tracing::debug!(binding = %binding.id(), code, "connection shut down by engine");
        if let Some(value) = value {
            on_shutdown(host, &value, code);
        }
    }
}

fn deliver_message<C: Send + 'static, V: 'static>(
    mut on_message: MessageFn<V>,
) -> impl FnMut(&Host, EventRecord<NativeHandle<C>, Vec<u8>>) + Send + 'static {
    move |host: &Host, record: EventRecord<NativeHandle<C>, Vec<u8>>| {
        let EventRecord { binding, payload } = record;
        if binding.is_closed(host) {
            return;
        }
        match binding.resolve::<V>(host) {
            Some(value) => on_message(host, &value, payload),
            None => tracing::debug!(binding = %binding.id(), "host value gone, message discarded"),
        }
    }
}
