//! Engine double that answers every request from its own threads

#![allow(dead_code)]

use hostbridge_binding::{ConnectionEngine, ConnectionSink, OperationSink};
use hostbridge_core::{BindingOptions, EngineError};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

#[derive(Default)]
pub struct ThreadedEngine {
    sinks: Mutex<Vec<ConnectionSink<u64>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    next_handle: AtomicU64,
    released: AtomicUsize,
}

impl ThreadedEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Sink of the `index`th connect request
    pub fn sink(&self, index: usize) -> ConnectionSink<u64> {
        self.sinks.lock()[index].clone()
    }

    /// Run `f` on a new engine thread
    pub fn spawn<F: FnOnce() + Send + 'static>(&self, f: F) {
        self.workers.lock().push(thread::spawn(f));
    }

    /// Wait for every engine thread started so far
    pub fn join(&self) {
        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        for worker in workers {
            worker.join().unwrap();
        }
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl ConnectionEngine for ThreadedEngine {
    type Connection = u64;

    fn connect(
        &self,
        _options: &BindingOptions,
        sink: ConnectionSink<u64>,
    ) -> Result<(), EngineError> {
        let handle = self.next_handle.fetch_add(1, Ordering::SeqCst);
        self.sinks.lock().push(sink.clone());
        self.spawn(move || sink.on_setup(Some(handle), 0));
        Ok(())
    }

    fn send(&self, _connection: &u64, payload: &[u8], sink: OperationSink) -> Result<(), EngineError> {
        let reply = payload.to_vec();
        self.spawn(move || sink.complete(&reply, 0));
        Ok(())
    }

    fn release_connection(&self, _connection: u64) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}
