//! Engine-facing event sinks
//!
//! Sinks are what the engine holds and calls from its own threads. Each
//! callback copies the borrowed payload once, takes a binding reference
//! from the engine-interval latch and queues a record on the matching
//! dispatch channel. Terminal callbacks take the interval reference itself,
//! so it travels with the final event. Once the latch has been released
//! (teardown ran, or a terminal event already fired) callbacks are dropped.

use crate::binding::{EventRecord, IntervalLatch};
use crate::engine::ClientLifecycle;
use crate::native::{NativeHandle, Releaser};
use crate::stream::StreamHandle;
use hostbridge_core::ERROR_CODE_SUCCESS;
use hostbridge_dispatch::DispatchChannel;
use std::fmt;
use std::sync::Arc;

pub(crate) type Channel<H, P> = DispatchChannel<EventRecord<H, P>>;

/// Outcome of connection setup as captured on the engine thread
pub(crate) struct SetupEvent<C> {
    pub(crate) handle: Option<NativeHandle<C>>,
    pub(crate) code: i32,
}

/// An incoming publish on a subscribed topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishEvent {
    pub topic: String,
    pub payload: Vec<u8>,
}

fn forward<H: Send + 'static, P: Send + 'static>(channel: &Channel<H, P>, record: EventRecord<H, P>) {
    if let Err(error) = channel.enqueue(record) {
        tracing::trace!(label = channel.label(), %error, "engine event discarded");
    }
}

/// Connection callbacks handed to [`ConnectionEngine::connect`](crate::ConnectionEngine::connect)
pub struct ConnectionSink<C: Send + 'static> {
    latch: IntervalLatch<NativeHandle<C>>,
    setup: Channel<NativeHandle<C>, SetupEvent<C>>,
    shutdown: Channel<NativeHandle<C>, i32>,
    message: Channel<NativeHandle<C>, Vec<u8>>,
    release: Releaser<C>,
}

impl<C: Send + 'static> ConnectionSink<C> {
    pub(crate) fn new(
        latch: IntervalLatch<NativeHandle<C>>,
        setup: Channel<NativeHandle<C>, SetupEvent<C>>,
        shutdown: Channel<NativeHandle<C>, i32>,
        message: Channel<NativeHandle<C>, Vec<u8>>,
        release: Releaser<C>,
    ) -> Self {
        Self {
            latch,
            setup,
            shutdown,
            message,
            release,
        }
    }

    /// Report setup: a connection handle on success, or a non-zero error code
    ///
    /// A failed setup is terminal. A handle arriving after the binding was
    /// torn down is released straight back to the engine.
    pub fn on_setup(&self, connection: Option<C>, error_code: i32) {
        let handle = connection.map(|c| NativeHandle::new(c, Arc::clone(&self.release)));
        let succeeded = error_code == ERROR_CODE_SUCCESS && handle.is_some();
        let binding = if succeeded {
            self.latch.get()
        } else {
            self.latch.release()
        };
        let Some(binding) = binding else {
            tracing::debug!(error_code, "setup reported after teardown, releasing handle");
            return;
        };
        forward(
            &self.setup,
            EventRecord {
                binding,
                payload: SetupEvent {
                    handle,
                    code: error_code,
                },
            },
        );
    }

    /// Report that the connection has shut down; terminal
    pub fn on_shutdown(&self, error_code: i32) {
        let Some(binding) = self.latch.release() else {
            return;
        };
        forward(
            &self.shutdown,
            EventRecord {
                binding,
                payload: error_code,
            },
        );
    }

    /// Report an incoming message; the payload is copied
    pub fn on_message(&self, payload: &[u8]) {
        let Some(binding) = self.latch.get() else {
            return;
        };
        forward(
            &self.message,
            EventRecord {
                binding,
                payload: payload.to_vec(),
            },
        );
    }

    /// Whether the bridge still wants events from this connection
    pub fn is_live(&self) -> bool {
        !self.latch.is_released()
    }
}

impl<C: Send + 'static> Clone for ConnectionSink<C> {
    fn clone(&self) -> Self {
        Self {
            latch: Arc::clone(&self.latch),
            setup: self.setup.clone(),
            shutdown: self.shutdown.clone(),
            message: self.message.clone(),
            release: Arc::clone(&self.release),
        }
    }
}

impl<C: Send + 'static> fmt::Debug for ConnectionSink<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSink")
            .field("live", &self.is_live())
            .finish()
    }
}

/// Stream callbacks handed to [`StreamEngine::open_stream`](crate::StreamEngine::open_stream)
pub struct StreamSink<S: Send + 'static, C: Send + 'static> {
    latch: IntervalLatch<StreamHandle<S, C>>,
    body: Channel<StreamHandle<S, C>, Vec<u8>>,
    complete: Channel<StreamHandle<S, C>, i32>,
}

impl<S: Send + 'static, C: Send + 'static> StreamSink<S, C> {
    pub(crate) fn new(
        latch: IntervalLatch<StreamHandle<S, C>>,
        body: Channel<StreamHandle<S, C>, Vec<u8>>,
        complete: Channel<StreamHandle<S, C>, i32>,
    ) -> Self {
        Self {
            latch,
            body,
            complete,
        }
    }

    /// Report a chunk of response body; the chunk is copied
    pub fn on_body(&self, chunk: &[u8]) {
        let Some(binding) = self.latch.get() else {
            return;
        };
        forward(
            &self.body,
            EventRecord {
                binding,
                payload: chunk.to_vec(),
            },
        );
    }

    /// Report stream completion; terminal
    pub fn on_complete(&self, error_code: i32) {
        let Some(binding) = self.latch.release() else {
            return;
        };
        forward(
            &self.complete,
            EventRecord {
                binding,
                payload: error_code,
            },
        );
    }

    pub fn is_live(&self) -> bool {
        !self.latch.is_released()
    }
}

impl<S: Send + 'static, C: Send + 'static> Clone for StreamSink<S, C> {
    fn clone(&self) -> Self {
        Self {
            latch: Arc::clone(&self.latch),
            body: self.body.clone(),
            complete: self.complete.clone(),
        }
    }
}

impl<S: Send + 'static, C: Send + 'static> fmt::Debug for StreamSink<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSink")
            .field("live", &self.is_live())
            .finish()
    }
}

/// Client callbacks handed to [`ClientEngine::new_client`](crate::ClientEngine::new_client)
pub struct ClientSink<Cl: Send + 'static> {
    latch: IntervalLatch<NativeHandle<Cl>>,
    lifecycle: Channel<NativeHandle<Cl>, ClientLifecycle>,
    publish: Channel<NativeHandle<Cl>, PublishEvent>,
    terminated: Channel<NativeHandle<Cl>, ()>,
}

impl<Cl: Send + 'static> ClientSink<Cl> {
    pub(crate) fn new(
        latch: IntervalLatch<NativeHandle<Cl>>,
        lifecycle: Channel<NativeHandle<Cl>, ClientLifecycle>,
        publish: Channel<NativeHandle<Cl>, PublishEvent>,
        terminated: Channel<NativeHandle<Cl>, ()>,
    ) -> Self {
        Self {
            latch,
            lifecycle,
            publish,
            terminated,
        }
    }

    pub fn on_lifecycle(&self, event: ClientLifecycle) {
        let Some(binding) = self.latch.get() else {
            return;
        };
        forward(
            &self.lifecycle,
            EventRecord {
                binding,
                payload: event,
            },
        );
    }

    /// Report an incoming publish; topic and payload are copied
    pub fn on_publish(&self, topic: &str, payload: &[u8]) {
        let Some(binding) = self.latch.get() else {
            return;
        };
        forward(
            &self.publish,
            EventRecord {
                binding,
                payload: PublishEvent {
                    topic: topic.to_string(),
                    payload: payload.to_vec(),
                },
            },
        );
    }

    /// Report that the engine will never call this client back again; terminal
    pub fn on_terminated(&self) {
        let Some(binding) = self.latch.release() else {
            return;
        };
        forward(&self.terminated, EventRecord { binding, payload: () });
    }

    pub fn is_live(&self) -> bool {
        !self.latch.is_released()
    }
}

impl<Cl: Send + 'static> Clone for ClientSink<Cl> {
    fn clone(&self) -> Self {
        Self {
            latch: Arc::clone(&self.latch),
            lifecycle: self.lifecycle.clone(),
            publish: self.publish.clone(),
            terminated: self.terminated.clone(),
        }
    }
}

impl<Cl: Send + 'static> fmt::Debug for ClientSink<Cl> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSink")
            .field("live", &self.is_live())
            .finish()
    }
}
