//! Hand-driven engine for unit tests
//!
//! Records every sink it is given so a test can fire engine callbacks from
//! whatever thread it likes, and records every handle released back to it.

use crate::engine::{ClientEngine, ConnectionEngine, StreamEngine};
use crate::operation::OperationSink;
use crate::sinks::{ClientSink, ConnectionSink, StreamSink};
use hostbridge_core::{BindingOptions, EngineError};
use hostbridge_dispatch::Host;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

pub(crate) const REJECTED: i32 = 7;

#[derive(Default)]
pub(crate) struct ScriptedEngine {
    connections: Mutex<Vec<ConnectionSink<u32>>>,
    streams: Mutex<Vec<StreamSink<u32, u32>>>,
    clients: Mutex<Vec<ClientSink<u32>>>,
    operations: Mutex<VecDeque<OperationSink>>,
    released: Mutex<Vec<(&'static str, u32)>>,
    calls: Mutex<Vec<String>>,
    reject: AtomicBool,
    next_handle: AtomicU32,
}

impl ScriptedEngine {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            next_handle: AtomicU32::new(100),
            ..Default::default()
        })
    }

    /// Make every following engine call fail synchronously
    pub(crate) fn reject_calls(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    pub(crate) fn connection_sink(&self, index: usize) -> ConnectionSink<u32> {
        self.connections.lock()[index].clone()
    }

    pub(crate) fn stream_sink(&self, index: usize) -> StreamSink<u32, u32> {
        self.streams.lock()[index].clone()
    }

    pub(crate) fn client_sink(&self, index: usize) -> ClientSink<u32> {
        self.clients.lock()[index].clone()
    }

    /// Oldest operation not yet taken
    pub(crate) fn take_operation(&self) -> Option<OperationSink> {
        self.operations.lock().pop_front()
    }

    pub(crate) fn pending_operations(&self) -> usize {
        self.operations.lock().len()
    }

    pub(crate) fn released(&self) -> Vec<(&'static str, u32)> {
        self.released.lock().clone()
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub(crate) fn handle(&self) -> u32 {
        self.next_handle.fetch_add(1, Ordering::SeqCst)
    }

    fn check(&self, call: impl Into<String>) -> Result<(), EngineError> {
        let call = call.into();
        if self.reject.load(Ordering::SeqCst) {
            return Err(EngineError::new(REJECTED, format!("{call} rejected")));
        }
        self.calls.lock().push(call);
        Ok(())
    }
}

impl ConnectionEngine for ScriptedEngine {
    type Connection = u32;

    fn connect(
        &self,
        options: &BindingOptions,
        sink: ConnectionSink<u32>,
    ) -> Result<(), EngineError> {
        self.check(format!("connect:{}", options.label))?;
        self.connections.lock().push(sink);
        Ok(())
    }

    fn send(&self, connection: &u32, _payload: &[u8], sink: OperationSink) -> Result<(), EngineError> {
        self.check(format!("send:{connection}"))?;
        self.operations.lock().push_back(sink);
        Ok(())
    }

    fn release_connection(&self, connection: u32) {
        self.released.lock().push(("connection", connection));
    }
}

impl StreamEngine for ScriptedEngine {
    type Stream = u32;

    fn open_stream(
        &self,
        connection: &u32,
        _request: &[u8],
        sink: StreamSink<u32, u32>,
    ) -> Result<u32, EngineError> {
        self.check(format!("open_stream:{connection}"))?;
        self.streams.lock().push(sink);
        Ok(self.handle())
    }

    fn activate(&self, stream: &u32) -> Result<(), EngineError> {
        self.check(format!("activate:{stream}"))
    }

    fn release_stream(&self, stream: u32) {
        self.released.lock().push(("stream", stream));
    }
}

impl ClientEngine for ScriptedEngine {
    type Client = u32;

    fn new_client(&self, options: &BindingOptions, sink: ClientSink<u32>) -> Result<u32, EngineError> {
        self.check(format!("new_client:{}", options.label))?;
        self.clients.lock().push(sink);
        Ok(self.handle())
    }

    fn start(&self, client: &u32) -> Result<(), EngineError> {
        self.check(format!("start:{client}"))
    }

    fn stop(&self, client: &u32) -> Result<(), EngineError> {
        self.check(format!("stop:{client}"))
    }

    fn publish(
        &self,
        client: &u32,
        topic: &str,
        _payload: &[u8],
        sink: OperationSink,
    ) -> Result<(), EngineError> {
        self.check(format!("publish:{client}:{topic}"))?;
        self.operations.lock().push_back(sink);
        Ok(())
    }

    fn subscribe(&self, client: &u32, topic: &str, sink: OperationSink) -> Result<(), EngineError> {
        self.check(format!("subscribe:{client}:{topic}"))?;
        self.operations.lock().push_back(sink);
        Ok(())
    }

    fn release_client(&self, client: u32) {
        self.released.lock().push(("client", client));
    }
}

/// Host value used by coordinator tests: an append-only event log
#[derive(Default)]
pub(crate) struct Wrapper {
    log: std::cell::RefCell<Vec<String>>,
}

impl Wrapper {
    pub(crate) fn record(&self, entry: impl Into<String>) {
        self.log.borrow_mut().push(entry.into());
    }

    pub(crate) fn log(&self) -> Vec<String> {
        self.log.borrow().clone()
    }
}

/// Log of the wrapper registered as `id`, or empty if it was collected
pub(crate) fn log_of(host: &Host, id: hostbridge_dispatch::HostObjectId) -> Vec<String> {
    host.resolve::<Wrapper>(id)
        .map(|wrapper| wrapper.log())
        .unwrap_or_default()
}

/// Run `f` on a fresh thread, standing in for an engine callback thread
pub(crate) fn on_engine_thread<F: FnOnce() + Send + 'static>(f: F) {
    std::thread::spawn(f).join().unwrap();
}
