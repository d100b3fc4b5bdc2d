//! Engine-side Tokio runtime

use crate::shutdown::{ShutdownHandle, ShutdownSignal};
use hostbridge_core::{BridgeConfig, BridgeError, BridgeResult};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::Notify;

/// Configuration for the engine runtime
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Number of worker threads (None = number of CPU cores)
    pub worker_threads: Option<usize>,
    /// Name prefix for worker threads
    pub thread_name: String,
    pub enable_io: bool,
    pub enable_time: bool,
    pub max_blocking_threads: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            thread_name: "hostbridge-engine".to_string(),
            enable_io: true,
            enable_time: true,
            max_blocking_threads: 64,
        }
    }
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runtime settings carried by a [`BridgeConfig`]
    pub fn from_bridge_config(config: &BridgeConfig) -> Self {
        Self {
            worker_threads: config.engine_threads,
            thread_name: config.thread_name.clone(),
            ..Self::default()
        }
    }

    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = Some(threads);
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}

/// Tasks spawned through the runtime that have not finished yet
#[derive(Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

struct InFlightGuard(Arc<InFlight>);

impl InFlightGuard {
    fn enter(in_flight: &Arc<InFlight>) -> Self {
        in_flight.count.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(in_flight))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// Multithreaded runtime the engine does its work on
///
/// Engine callbacks into bridge sinks happen on this runtime's worker
/// threads. Dropping the runtime triggers shutdown and stops the workers
/// without waiting, so it is safe to drop from inside an engine task.
pub struct EngineRuntime {
    runtime: Option<Runtime>,
    handle: Handle,
    shutdown_handle: ShutdownHandle,
    in_flight: Arc<InFlight>,
    config: RuntimeConfig,
}

impl EngineRuntime {
    pub fn new(config: RuntimeConfig) -> BridgeResult<Self> {
        let mut builder = Builder::new_multi_thread();

        if let Some(threads) = config.worker_threads {
            builder.worker_threads(threads);
        }

        builder
            .thread_name(&config.thread_name)
            .max_blocking_threads(config.max_blocking_threads);

        if config.enable_io {
            builder.enable_io();
        }

        if config.enable_time {
            builder.enable_time();
        }

        let runtime = builder
            .build()
            .map_err(|e| BridgeError::RuntimeError(format!("failed to create engine runtime: {e}")))?;
        tracing::debug!(thread_name = %config.thread_name, workers = ?config.worker_threads, "engine runtime started");

        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
            shutdown_handle: ShutdownHandle::new(),
            in_flight: Arc::new(InFlight::default()),
            config,
        })
    }

    pub fn with_defaults() -> BridgeResult<Self> {
        Self::new(RuntimeConfig::default())
    }

    pub fn from_bridge_config(config: &BridgeConfig) -> BridgeResult<Self> {
        Self::new(RuntimeConfig::from_bridge_config(config))
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown_handle.signal()
    }

    /// Block the calling thread on `future`
    ///
    /// Panics if called from one of this runtime's own threads.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.handle.block_on(future)
    }

    /// Spawn an engine task; [`shutdown`](Self::shutdown) waits for it
    pub fn spawn<F>(&self, future: F) -> tokio::task::JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let guard = InFlightGuard::enter(&self.in_flight);
        self.handle.spawn(async move {
            let output = future.await;
            drop(guard);
            output
        })
    }

    pub fn spawn_blocking<F, R>(&self, func: F) -> tokio::task::JoinHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.handle.spawn_blocking(func)
    }

    /// Tasks spawned with [`spawn`](Self::spawn) that are still running
    pub fn in_flight(&self) -> usize {
        self.in_flight.count.load(Ordering::SeqCst)
    }

    /// Signal shutdown and wait up to `timeout` for spawned tasks to finish
    ///
    /// Returns `Err(Timeout)` if tasks were still running at the deadline.
    pub fn shutdown(&self, timeout: Duration) -> BridgeResult<()> {
        tracing::info!(?timeout, in_flight = self.in_flight(), "engine runtime shutting down");
        self.shutdown_handle.trigger();

        let in_flight = Arc::clone(&self.in_flight);
        let drained = self.block_on(async move {
            tokio::time::timeout(timeout, async {
                loop {
                    let idle = in_flight.idle.notified();
                    if in_flight.count.load(Ordering::SeqCst) == 0 {
                        return;
                    }
                    idle.await;
                }
            })
            .await
        });

        match drained {
            Ok(()) => {
                tracing::info!("engine runtime drained");
                Ok(())
            }
            Err(_) => {
                tracing::warn!(in_flight = self.in_flight(), "engine runtime did not drain in time");
                Err(BridgeError::Timeout)
            }
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown_handle.is_triggered()
    }
}

impl Drop for EngineRuntime {
    fn drop(&mut self) {
        self.shutdown_handle.trigger();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
