//! Process-level setup

use hostbridge_core::{BridgeConfig, BridgeResult, LogLevel};
use hostbridge_logging::{LogSink, LogSinkManager, ReloadHandle, init_logging};
use hostbridge_runtime::{BlockingBridge, Credentials, CredentialsProvider, EngineRuntime};
use std::sync::Arc;

/// One-time process initialization: installs the host log layer at the
/// configured level
///
/// Calling it again only changes the level.
pub fn init(config: &BridgeConfig) -> BridgeResult<()> {
    let level = config.level()?;
    init_logging(level)?;
    tracing::debug!(%level, "hostbridge initialized");
    Ok(())
}

/// Everything the engine side of one process needs
///
/// Owns the engine runtime shared by engines and the blocking bridge host
/// threads use to wait on it.
pub struct Bridge {
    config: BridgeConfig,
    blocking: BlockingBridge,
}

impl Bridge {
    /// Initialize logging and start the engine runtime
    pub fn new(config: &BridgeConfig) -> BridgeResult<Self> {
        init(config)?;
        Self::with_runtime(config, Arc::new(EngineRuntime::from_bridge_config(config)?))
    }

    /// Bridge over an existing runtime; does not touch logging
    pub fn with_runtime(config: &BridgeConfig, runtime: Arc<EngineRuntime>) -> BridgeResult<Self> {
        config.level()?;
        Ok(Self {
            config: config.clone(),
            blocking: BlockingBridge::new(runtime),
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn runtime(&self) -> &Arc<EngineRuntime> {
        self.blocking.runtime()
    }

    pub fn blocking(&self) -> &BlockingBridge {
        &self.blocking
    }

    /// Install the host log sink, replacing any previous one
    pub fn set_log_sink(&self, sink: Option<LogSink>) {
        LogSinkManager::global().set_sink(sink);
    }

    /// Change the log level of a running process
    pub fn set_log_level(&self, level: LogLevel) -> BridgeResult<()> {
        LogSinkManager::global().set_level(level);
        let reload = ReloadHandle::global();
        if reload.is_initialized() {
            reload.reload_level(level)?;
        }
        Ok(())
    }

    /// Resolve credentials, blocking for at most the configured timeout
    pub fn fetch_credentials(&self, provider: Arc<dyn CredentialsProvider>) -> BridgeResult<Credentials> {
        self.blocking
            .fetch_credentials(provider, self.config.credentials_timeout())
    }

    /// Stop the engine runtime, waiting up to the configured drain timeout
    pub fn shutdown(&self) -> BridgeResult<()> {
        self.runtime().shutdown(self.config.drain_timeout())
    }
}

#[cfg(test)]
#[path = "bridge/bridge_tests.rs"]
mod bridge_tests;
