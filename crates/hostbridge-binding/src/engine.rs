//! Engine interface
//!
//! An engine runs on its own threads and reports back only through the
//! sinks it is given. Payload views passed to a sink are borrowed for the
//! duration of the call. An error code of `0` means success.

use crate::operation::OperationSink;
use crate::sinks::{ClientSink, ConnectionSink, StreamSink};
use hostbridge_core::{BindingOptions, EngineError};
use serde::{Deserialize, Serialize};

/// Engine that establishes connections and sends on them
pub trait ConnectionEngine: Send + Sync + 'static {
    type Connection: Send + 'static;

    /// Begin connecting; setup is reported later through `sink`
    fn connect(
        &self,
        options: &BindingOptions,
        sink: ConnectionSink<Self::Connection>,
    ) -> Result<(), EngineError>;

    /// Send a payload; the outcome is reported through `sink`
    fn send(
        &self,
        connection: &Self::Connection,
        payload: &[u8],
        sink: OperationSink,
    ) -> Result<(), EngineError>;

    /// Take back a connection handle; no connection callback follows
    /// except an optional shutdown
    fn release_connection(&self, connection: Self::Connection);
}

/// Engine that opens request/response streams on a connection
pub trait StreamEngine: ConnectionEngine {
    type Stream: Send + 'static;

    fn open_stream(
        &self,
        connection: &Self::Connection,
        request: &[u8],
        sink: StreamSink<Self::Stream, Self::Connection>,
    ) -> Result<Self::Stream, EngineError>;

    /// Start delivering the stream's response
    fn activate(&self, stream: &Self::Stream) -> Result<(), EngineError>;

    fn release_stream(&self, stream: Self::Stream);
}

/// Engine hosting long-lived publish/subscribe clients
pub trait ClientEngine: Send + Sync + 'static {
    type Client: Send + 'static;

    fn new_client(
        &self,
        options: &BindingOptions,
        sink: ClientSink<Self::Client>,
    ) -> Result<Self::Client, EngineError>;

    fn start(&self, client: &Self::Client) -> Result<(), EngineError>;

    fn stop(&self, client: &Self::Client) -> Result<(), EngineError>;

    fn publish(
        &self,
        client: &Self::Client,
        topic: &str,
        payload: &[u8],
        sink: OperationSink,
    ) -> Result<(), EngineError>;

    fn subscribe(
        &self,
        client: &Self::Client,
        topic: &str,
        sink: OperationSink,
    ) -> Result<(), EngineError>;

    /// Take back a client handle; the engine then reports `on_terminated`
    fn release_client(&self, client: Self::Client);
}

/// Lifecycle events of a long-lived client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum ClientLifecycle {
    AttemptingConnect,
    ConnectionSuccess,
    ConnectionFailure { code: i32 },
    Disconnection { code: i32 },
    Stopped,
}
