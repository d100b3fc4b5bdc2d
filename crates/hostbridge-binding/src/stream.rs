//! Stream lifecycle coordinator
//!
//! A stream is opened on an operational connection and co-owns that
//! connection's binding until its own engine handle is released, so the
//! connection binding always outlives the stream handle. Closing the
//! connection still releases the engine connection; the engine then
//! completes the stream.

use crate::binding::{BindingOwner, EventRecord};
use crate::connection::{Connection, ConnectionBinding};
use crate::engine::{ConnectionEngine, StreamEngine};
use crate::native::{NativeHandle, Releaser};
use crate::sinks::StreamSink;
use crate::tracker::{BindingId, BindingKind};
use hostbridge_core::{BindingState, BridgeError, BridgeResult, ERROR_CODE_SUCCESS};
use hostbridge_dispatch::{DispatchChannel, Host, HostObjectId, RetireMode};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

const KIND: BindingKind = BindingKind::Stream;

/// Engine stream handle plus the connection binding it depends on
///
/// Field order matters: the stream is released before the connection
/// reference is given up.
pub struct StreamHandle<S: Send + 'static, C: Send + 'static> {
    stream: NativeHandle<S>,
    _connection: ConnectionBinding<C>,
}

impl<S: Send + 'static, C: Send + 'static> StreamHandle<S, C> {
    pub fn stream(&self) -> Option<&S> {
        self.stream.get()
    }
}

type BodyFn<V> = Box<dyn FnMut(&Host, &V, Vec<u8>) + Send>;
type CompleteFn<V> = Box<dyn FnMut(&Host, &V, BridgeResult<()>) + Send>;

/// Host-side callbacks for one stream
pub struct StreamCallbacks<V> {
    on_body: BodyFn<V>,
    on_complete: CompleteFn<V>,
}

impl<V: 'static> StreamCallbacks<V> {
    pub fn new() -> Self {
        Self {
            on_body: Box::new(|_, _, _| {}),
            on_complete: Box::new(|_, _, _| {}),
        }
    }

    /// Called for each body chunk, in engine order, before completion
    pub fn on_body<F>(mut self, f: F) -> Self
    where
        F: FnMut(&Host, &V, Vec<u8>) + Send + 'static,
    {
        self.on_body = Box::new(f);
        self
    }

    pub fn on_complete<F>(mut self, f: F) -> Self
    where
        F: FnMut(&Host, &V, BridgeResult<()>) + Send + 'static,
    {
        self.on_complete = Box::new(f);
        self
    }
}

impl<V: 'static> Default for StreamCallbacks<V> {
    fn default() -> Self {
        Self::new()
    }
}

type StreamOwner<E> =
    BindingOwner<StreamHandle<<E as StreamEngine>::Stream, <E as ConnectionEngine>::Connection>>;

/// Host-visible request/response stream
pub struct Stream<E: StreamEngine, V: 'static> {
    owner: StreamOwner<E>,
    engine: Arc<E>,
    _value: PhantomData<fn(&V)>,
}

impl<E: StreamEngine, V: 'static> Stream<E, V> {
    /// Open a stream on an operational connection
    pub fn open<CV: 'static>(
        host: &Host,
        connection: &Connection<E, CV>,
        request: &[u8],
        callbacks: StreamCallbacks<V>,
        value: V,
    ) -> BridgeResult<Self> {
        let parent = connection.binding()?;
        parent.with_core(host, |core| core.expect_operational(BindingKind::Connection))?;

        let owner = BindingOwner::new(host, KIND, value);
        let binding = owner.binding()?;
        let StreamCallbacks {
            on_body,
            on_complete,
        } = callbacks;
        let body = DispatchChannel::create(host, "stream.body", deliver_body(on_body))?;
        let complete =
            DispatchChannel::create(host, "stream.complete", deliver_complete(on_complete))?;
        binding.attach(host, Box::new(body.clone()));
        binding.attach(host, Box::new(complete.clone()));

        let latch = binding.arm_interval(host);
        let sink = StreamSink::new(latch, body, complete);
        let engine = Arc::clone(connection.engine());
        let opened = parent.with_core(host, |core| {
            match core.native.as_ref().and_then(NativeHandle::get) {
                Some(native) => engine
                    .open_stream(native, request, sink)
                    .map_err(|error| BridgeError::ConstructionFailed(error.to_string())),
                None => Err(BridgeError::Internal(
                    "operational connection has no engine handle".to_string(),
                )),
            }
        });
        let stream = match opened {
            Ok(stream) => stream,
            Err(error) => {
                tracing::warn!(binding = %binding.id(), %error, "engine refused to open stream");
                return Err(error);
            }
        };

        let handle = StreamHandle {
            stream: NativeHandle::new(stream, releaser(&engine)),
            _connection: parent,
        };
        binding.with_core(host, |core| core.native = Some(handle));
        tracing::debug!(binding = %binding.id(), "stream opened");

        Ok(Self {
            engine,
            owner,
            _value: PhantomData,
        })
    }

    /// Start the stream; body and completion follow on the host thread
    pub fn activate(&self, host: &Host) -> BridgeResult<()> {
        let binding = self.owner.binding()?;
        binding.with_core(host, |core| {
            core.expect_state(BindingState::Created, KIND)?;
            core.transition(BindingState::Connecting)?;
            let activated = match core.native.as_ref().and_then(StreamHandle::stream) {
                Some(stream) => self.engine.activate(stream).map_err(BridgeError::from),
                None => Err(BridgeError::Internal("stream has no engine handle".to_string())),
            };
            match activated {
                Ok(()) => core.transition(BindingState::Operational),
                Err(error) => {
                    core.transition(BindingState::Created)?;
                    Err(error)
                }
            }
        })
    }

    /// Close the stream; later calls have no effect
    pub fn close(&self, host: &Host) {
        debug_assert_eq!(host.id(), self.host_object().host());
        if self.owner.close() {
            tracing::debug!("stream closed");
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
}

impl<E: StreamEngine, V: 'static> fmt::Debug for Stream<E, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("binding", &self.owner.binding_id())
            .finish()
    }
}

fn releaser<E: StreamEngine>(engine: &Arc<E>) -> Releaser<E::Stream> {
    let engine = Arc::downgrade(engine);
    Arc::new(move |stream: E::Stream| match engine.upgrade() {
        Some(engine) => engine.release_stream(stream),
        None => drop(stream),
    })
}

fn deliver_body<S: Send + 'static, C: Send + 'static, V: 'static>(
    mut on_body: BodyFn<V>,
) -> impl FnMut(&Host, EventRecord<StreamHandle<S, C>, Vec<u8>>) + Send + 'static {
    move |host: &Host, record: EventRecord<StreamHandle<S, C>, Vec<u8>>| {
        let EventRecord { binding, payload } = record;
        if binding.is_closed(host) {
            return;
        }
        match binding.resolve::<V>(host) {
            Some(value) => on_body(host, &value, payload),
            None => tracing::debug!(binding = %binding.id(), "host value gone, body discarded"),
        }
    }
}

fn deliver_complete<S: Send + 'static, C: Send + 'static, V: 'static>(
    mut on_complete: CompleteFn<V>,
) -> impl FnMut(&Host, EventRecord<StreamHandle<S, C>, i32>) + Send + 'static {
    move |host: &Host, record: EventRecord<StreamHandle<S, C>, i32>| {
        let EventRecord { binding, payload: code } = record;
        if binding.is_closed(host) {
            tracing::debug!(binding = %binding.id(), "completion after close discarded");
            return;
        }
        let value = binding.resolve::<V>(host);
        binding.teardown(host, RetireMode::Drain);
        let result = if code == ERROR_CODE_SUCCESS {
            Ok(())
        } else {
            Err(BridgeError::Engine {
                code,
                message: "stream failed".to_string(),
            })
        };
        match value {
            Some(value) => on_complete(host, &value, result),
            None => tracing::debug!(binding = %binding.id(), "host value gone, completion discarded"),
        }
    }
}

#[cfg(test)]
#[path = "stream/stream_tests.rs"]
mod stream_tests;
