//! Blocking calls into the engine runtime
//!
//! These are the only places the bridge blocks a thread. They must be
//! called from a thread the runtime does not own (the host thread or a
//! background thread); calling them from an engine task would deadlock
//! the worker, so that is refused.

use crate::credentials::{Credentials, CredentialsProvider};
use crate::{EngineRuntime, ShutdownSignal};
use hostbridge_core::{BridgeError, BridgeResult};
use parking_lot::{Condvar, Mutex};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Single-use slot a blocked caller waits on
struct Rendezvous<T> {
    slot: Mutex<Option<T>>,
    ready: Condvar,
}

impl<T> Rendezvous<T> {
    fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    fn fill(&self, value: T) {
        let mut slot = self.slot.lock();
        if slot.is_none() {
            *slot = Some(value);
            self.ready.notify_all();
        }
    }

    /// Wait until filled or `deadline` passes
    fn wait_until(&self, deadline: Instant) -> Option<T> {
        let mut slot = self.slot.lock();
        while slot.is_none() {
            if self.ready.wait_until(&mut slot, deadline).timed_out() {
                break;
            }
        }
        slot.take()
    }
}

/// Bridge for blocking a non-engine thread on engine-side async work
pub struct BlockingBridge {
    runtime: Arc<EngineRuntime>,
}

impl BlockingBridge {
    pub fn new(runtime: Arc<EngineRuntime>) -> Self {
        Self { runtime }
    }

    pub fn runtime(&self) -> &Arc<EngineRuntime> {
        &self.runtime
    }

    fn check_caller(&self) -> BridgeResult<()> {
        if self.runtime.is_shutting_down() {
            return Err(BridgeError::RuntimeError(
                "engine runtime is shutting down".to_string(),
            ));
        }
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(BridgeError::RuntimeError(
                "blocking call from inside an async context".to_string(),
            ));
        }
        Ok(())
    }

    /// Run `future` on the engine runtime and block until it resolves
    pub fn call_sync<F, T>(&self, future: F) -> BridgeResult<T>
    where
        F: Future<Output = BridgeResult<T>>,
    {
        self.check_caller()?;
        self.runtime.block_on(future)
    }

    /// Like [`call_sync`](Self::call_sync), failing with `Timeout` after `timeout`
    pub fn call_sync_timeout<F, T>(&self, future: F, timeout: Duration) -> BridgeResult<T>
    where
        F: Future<Output = BridgeResult<T>>,
    {
        self.check_caller()?;
        self.runtime.block_on(async move {
            match tokio::time::timeout(timeout, future).await {
                Ok(result) => result,
                Err(_) => Err(BridgeError::Timeout),
            }
        })
    }

    pub fn spawn<F, T>(&self, future: F) -> tokio::task::JoinHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.runtime.spawn(future)
    }

    /// Resolve credentials on the engine runtime, blocking for at most `timeout`
    ///
    /// The provider runs as an engine task; the caller waits on a one-shot
    /// condition variable. If the wait times out the task keeps running and
    /// its late result is dropped.
    pub fn fetch_credentials(
        &self,
        provider: Arc<dyn CredentialsProvider>,
        timeout: Duration,
    ) -> BridgeResult<Credentials> {
        self.check_caller()?;
        let deadline = Instant::now() + timeout;
        let rendezvous = Arc::new(Rendezvous::new());

        let filled = Arc::clone(&rendezvous);
        let mut shutdown = self.runtime.shutdown_signal();
        self.runtime.spawn(async move {
            let result = tokio::select! {
                result = provider.get_credentials() => result,
                _ = shutdown.wait() => Err(BridgeError::Cancelled),
            };
            filled.fill(result);
        });

        match rendezvous.wait_until(deadline) {
            Some(result) => {
                if let Err(error) = &result {
                    tracing::warn!(%error, "credentials fetch failed");
                }
                result
            }
            None => {
                tracing::warn!(?timeout, "credentials fetch timed out");
                Err(BridgeError::Timeout)
            }
        }
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.runtime.shutdown_signal()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.runtime.is_shutting_down()
    }
}
