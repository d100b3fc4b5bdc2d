//! Loopback engine

use crate::options::LoopbackOptions;
use dashmap::DashMap;
use hostbridge_binding::{
    ClientEngine, ClientLifecycle, ClientSink, ConnectionEngine, ConnectionSink, OperationSink,
    StreamEngine, StreamSink,
};
use hostbridge_core::{BindingOptions, BridgeResult, ERROR_CODE_SUCCESS, EngineError};
use hostbridge_runtime::EngineRuntime;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Engine refused the request synchronously
pub const ERROR_REJECTED: i32 = 1001;
/// The connection or client is no longer known to the engine
pub const ERROR_NOT_CONNECTED: i32 = 1002;
/// The stream was already activated
pub const ERROR_STREAM_ACTIVE: i32 = 1003;

/// Engine connection handle
#[derive(Debug, PartialEq, Eq)]
pub struct LoopbackConnection {
    id: u64,
}

impl LoopbackConnection {
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Engine stream handle
#[derive(Debug, PartialEq, Eq)]
pub struct LoopbackStream {
    id: u64,
    connection: u64,
}

impl LoopbackStream {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn connection_id(&self) -> u64 {
        self.connection
    }
}

/// Engine client handle
#[derive(Debug, PartialEq, Eq)]
pub struct LoopbackClient {
    id: u64,
}

impl LoopbackClient {
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Handles given back through the `release_*` entry points
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReleaseCounts {
    pub connections: usize,
    pub streams: usize,
    pub clients: usize,
}

struct ConnectionEntry {
    sink: ConnectionSink<LoopbackConnection>,
    options: LoopbackOptions,
}

struct StreamEntry {
    sink: StreamSink<LoopbackStream, LoopbackConnection>,
    connection: u64,
    request: Vec<u8>,
    chunk_size: usize,
    activated: bool,
    orphaned: bool,
}

struct ClientEntry {
    sink: ClientSink<LoopbackClient>,
    options: LoopbackOptions,
    subscriptions: Mutex<HashSet<String>>,
}

#[derive(Default)]
struct Released {
    connections: AtomicUsize,
    streams: AtomicUsize,
    clients: AtomicUsize,
}

#[derive(Default)]
struct Shared {
    next_id: AtomicU64,
    connections: DashMap<u64, ConnectionEntry>,
    streams: DashMap<u64, StreamEntry>,
    clients: DashMap<u64, ClientEntry>,
    released: Released,
}

impl Shared {
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Client sinks subscribed to `topic`
    fn subscribers(&self, topic: &str) -> Vec<ClientSink<LoopbackClient>> {
        self.clients
            .iter()
            .filter(|entry| entry.subscriptions.lock().contains(topic))
            .map(|entry| entry.sink.clone())
            .collect()
    }

    /// Complete every stream of `connection` with [`ERROR_NOT_CONNECTED`]
    ///
    /// Each stream is failed once; later activation is refused.
    fn orphan_streams(&self, connection: u64) -> usize {
        let sinks: Vec<_> = self
            .streams
            .iter_mut()
            .filter(|entry| entry.connection == connection && !entry.orphaned)
            .map(|mut entry| {
                entry.orphaned = true;
                entry.sink.clone()
            })
            .collect();
        for sink in &sinks {
            sink.on_complete(ERROR_NOT_CONNECTED);
        }
        sinks.len()
    }
}

/// Engine that answers every request from its own runtime
///
/// Sends are echoed back as incoming messages and completed with the sent
/// payload. A stream's response body is its request, split into
/// `chunk_size` pieces. A publish reaches every client subscribed to its
/// topic, the publisher included.
pub struct LoopbackEngine {
    runtime: Arc<EngineRuntime>,
    shared: Arc<Shared>,
}

impl LoopbackEngine {
    pub fn new(runtime: Arc<EngineRuntime>) -> Self {
        Self {
            runtime,
            shared: Arc::new(Shared::default()),
        }
    }

    /// Engine on a fresh default runtime
    pub fn with_defaults() -> BridgeResult<Self> {
        Ok(Self::new(Arc::new(EngineRuntime::with_defaults()?)))
    }

    pub fn runtime(&self) -> &Arc<EngineRuntime> {
        &self.runtime
    }

    /// Ids of connections whose setup succeeded and that are not yet released
    pub fn connection_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.shared.connections.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn client_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.shared.clients.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn live_streams(&self) -> usize {
        self.shared.streams.len()
    }

    pub fn released(&self) -> ReleaseCounts {
        let released = &self.shared.released;
        ReleaseCounts {
            connections: released.connections.load(Ordering::SeqCst),
            streams: released.streams.load(Ordering::SeqCst),
            clients: released.clients.load(Ordering::SeqCst),
        }
    }

    /// Shut connection `id` down from the engine side with `code`
    ///
    /// Like the other injection hooks, the callback runs on the calling
    /// thread. Returns false if the connection is unknown.
    pub fn drop_connection(&self, id: u64, code: i32) -> bool {
        let Some((_, entry)) = self.shared.connections.remove(&id) else {
            return false;
        };
        tracing::debug!(connection = id, code, "loopback dropping connection");
        entry.sink.on_shutdown(code);
        self.shared.orphan_streams(id);
        true
    }

    /// Deliver `payload` to connection `id` as an incoming message
    pub fn push_message(&self, id: u64, payload: &[u8]) -> bool {
        let Some(sink) = self.shared.connections.get(&id).map(|entry| entry.sink.clone()) else {
            return false;
        };
        sink.on_message(payload);
        true
    }

    /// Report a disconnection on client `id`
    pub fn disconnect_client(&self, id: u64, code: i32) -> bool {
        let Some(sink) = self.shared.clients.get(&id).map(|entry| entry.sink.clone()) else {
            return false;
        };
        sink.on_lifecycle(ClientLifecycle::Disconnection { code });
        true
    }

    fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        // Detached; shutdown of the runtime waits for it.
        drop(self.runtime.spawn(future));
    }

    fn complete_after(&self, delay: Duration, sink: OperationSink, reply: Vec<u8>) {
        self.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            sink.complete(&reply, ERROR_CODE_SUCCESS);
        });
    }
}

fn rejected(what: &str) -> EngineError {
    EngineError::new(ERROR_REJECTED, format!("loopback rejected {what}"))
}

fn not_connected(id: u64) -> EngineError {
    EngineError::new(ERROR_NOT_CONNECTED, format!("no loopback binding {id}"))
}

impl ConnectionEngine for LoopbackEngine {
    type Connection = LoopbackConnection;

    fn connect(
        &self,
        options: &BindingOptions,
        sink: ConnectionSink<LoopbackConnection>,
    ) -> Result<(), EngineError> {
        let options = LoopbackOptions::from_options(options);
        if options.reject_connect {
            return Err(rejected("connect"));
        }

        let id = self.shared.next_id();
        let shared = Arc::clone(&self.shared);
        self.spawn(async move {
            tokio::time::sleep(options.setup_delay()).await;
            if options.setup_error_code != ERROR_CODE_SUCCESS {
                tracing::debug!(connection = id, code = options.setup_error_code, "loopback setup failed");
                sink.on_setup(None, options.setup_error_code);
                return;
            }
            // Registered before the handle is handed out, so an immediate
            // release finds it.
            shared.connections.insert(
                id,
                ConnectionEntry {
                    sink: sink.clone(),
                    options,
                },
            );
            sink.on_setup(Some(LoopbackConnection { id }), ERROR_CODE_SUCCESS);
        });
        Ok(())
    }

    fn send(
        &self,
        connection: &LoopbackConnection,
        payload: &[u8],
        sink: OperationSink,
    ) -> Result<(), EngineError> {
        let (message_sink, options) = match self.shared.connections.get(&connection.id) {
            Some(entry) => (entry.sink.clone(), entry.options.clone()),
            None => return Err(not_connected(connection.id)),
        };
        if options.reject_operations {
            return Err(rejected("send"));
        }

        let echo = payload.to_vec();
        let reply = echo.clone();
        self.spawn(async move { message_sink.on_message(&echo) });
        self.complete_after(options.operation_delay(), sink, reply);
        Ok(())
    }

    fn release_connection(&self, connection: LoopbackConnection) {
        self.shared.connections.remove(&connection.id);
        let orphaned = self.shared.orphan_streams(connection.id);
        self.shared.released.connections.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(connection = connection.id, orphaned, "loopback connection released");
    }
}

impl StreamEngine for LoopbackEngine {
    type Stream = LoopbackStream;

    fn open_stream(
        &self,
        connection: &LoopbackConnection,
        request: &[u8],
        sink: StreamSink<LoopbackStream, LoopbackConnection>,
    ) -> Result<LoopbackStream, EngineError> {
        let options = match self.shared.connections.get(&connection.id) {
            Some(entry) => entry.options.clone(),
            None => return Err(not_connected(connection.id)),
        };
        if options.reject_operations {
            return Err(rejected("stream"));
        }

        let id = self.shared.next_id();
        self.shared.streams.insert(
            id,
            StreamEntry {
                sink,
                connection: connection.id,
                request: request.to_vec(),
                chunk_size: options.chunk_size,
                activated: false,
                orphaned: false,
            },
        );
        Ok(LoopbackStream {
            id,
            connection: connection.id,
        })
    }

    fn activate(&self, stream: &LoopbackStream) -> Result<(), EngineError> {
        let (sink, request, chunk_size) = {
            let mut entry = self
                .shared
                .streams
                .get_mut(&stream.id)
                .ok_or_else(|| not_connected(stream.id))?;
            if entry.orphaned || !self.shared.connections.contains_key(&entry.connection) {
                return Err(not_connected(entry.connection));
            }
            if entry.activated {
                return Err(EngineError::new(ERROR_STREAM_ACTIVE, "stream already active"));
            }
            entry.activated = true;
            (entry.sink.clone(), std::mem::take(&mut entry.request), entry.chunk_size)
        };

        self.spawn(async move {
            for chunk in request.chunks(chunk_size) {
                if !sink.is_live() {
                    return;
                }
                sink.on_body(chunk);
            }
            sink.on_complete(ERROR_CODE_SUCCESS);
        });
        Ok(())
    }

    fn release_stream(&self, stream: LoopbackStream) {
        self.shared.streams.remove(&stream.id);
        self.shared.released.streams.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(stream = stream.id, "loopback stream released");
    }
}

impl ClientEngine for LoopbackEngine {
    type Client = LoopbackClient;

    fn new_client(
        &self,
        options: &BindingOptions,
        sink: ClientSink<LoopbackClient>,
    ) -> Result<LoopbackClient, EngineError> {
        let options = LoopbackOptions::from_options(options);
        if options.reject_connect {
            return Err(rejected("client"));
        }

        let id = self.shared.next_id();
        self.shared.clients.insert(
            id,
            ClientEntry {
                sink,
                options,
                subscriptions: Mutex::new(HashSet::new()),
            },
        );
        Ok(LoopbackClient { id })
    }

    fn start(&self, client: &LoopbackClient) -> Result<(), EngineError> {
        let (sink, options) = match self.shared.clients.get(&client.id) {
            Some(entry) => (entry.sink.clone(), entry.options.clone()),
            None => return Err(not_connected(client.id)),
        };

        self.spawn(async move {
            sink.on_lifecycle(ClientLifecycle::AttemptingConnect);
            tokio::time::sleep(options.setup_delay()).await;
            let event = match options.setup_error_code {
                ERROR_CODE_SUCCESS => ClientLifecycle::ConnectionSuccess,
                code => ClientLifecycle::ConnectionFailure { code },
            };
            sink.on_lifecycle(event);
        });
        Ok(())
    }

    fn stop(&self, client: &LoopbackClient) -> Result<(), EngineError> {
        let sink = match self.shared.clients.get(&client.id) {
            Some(entry) => entry.sink.clone(),
            None => return Err(not_connected(client.id)),
        };
        self.spawn(async move { sink.on_lifecycle(ClientLifecycle::Stopped) });
        Ok(())
    }

    fn publish(
        &self,
        client: &LoopbackClient,
        topic: &str,
        payload: &[u8],
        sink: OperationSink,
    ) -> Result<(), EngineError> {
        let options = match self.shared.clients.get(&client.id) {
            Some(entry) => entry.options.clone(),
            None => return Err(not_connected(client.id)),
        };
        if options.reject_operations {
            return Err(rejected("publish"));
        }

        let shared = Arc::clone(&self.shared);
        let topic = topic.to_string();
        let payload = payload.to_vec();
        let delay = options.operation_delay();
        self.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            for subscriber in shared.subscribers(&topic) {
                subscriber.on_publish(&topic, &payload);
            }
            sink.complete(&[], ERROR_CODE_SUCCESS);
        });
        Ok(())
    }

    fn subscribe(&self, client: &LoopbackClient, topic: &str, sink: OperationSink) -> Result<(), EngineError> {
        let delay = {
            let entry = self
                .shared
                .clients
                .get(&client.id)
                .ok_or_else(|| not_connected(client.id))?;
            if entry.options.reject_operations {
                return Err(rejected("subscribe"));
            }
            entry.subscriptions.lock().insert(topic.to_string());
            entry.options.operation_delay()
        };
        self.complete_after(delay, sink, Vec::new());
        Ok(())
    }

    fn release_client(&self, client: LoopbackClient) {
        let removed = self.shared.clients.remove(&client.id);
        self.shared.released.clients.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(client = client.id, "loopback client released");
        if let Some((_, entry)) = removed {
            self.spawn(async move { entry.sink.on_terminated() });
        }
    }
}
