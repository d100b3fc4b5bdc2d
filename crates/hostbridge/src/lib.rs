//! # hostbridge
//!
//! Delivers events from a multithreaded engine to a single-threaded host
//! without ever touching host objects off the host thread.
//!
//! hostbridge provides:
//! - A cooperatively scheduled [`Host`] loop and [`DispatchChannel`]s that
//!   carry engine events onto it
//! - Reference-counted bindings that keep native resources alive exactly as
//!   long as either side can still reach them
//! - Lifecycle coordinators for connections, streams and long-lived clients
//! - An engine-side Tokio runtime, blocking credential resolution, and
//!   log forwarding to a host sink
//!
//! ## Quick Start
//!
//! ```ignore
//! use hostbridge::prelude::*;
//! use hostbridge::loopback::LoopbackEngine;
//!
//! let bridge = Bridge::new(&BridgeConfig::default())?;
//! let engine = Arc::new(LoopbackEngine::new(Arc::clone(bridge.runtime())));
//! let host = Host::new();
//!
//! let connection = Connection::create(&host, engine, BindingOptions::new("echo"), ())?;
//! connection.connect(
//!     &host,
//!     ConnectionCallbacks::new().on_message(|_, _, payload| {
//!         tracing::info!(len = payload.len(), "message");
//!     }),
//! )?;
//! host.run_for(Duration::from_millis(100));
//! connection.close(&host);
//! ```
//!
//! ## Crate Structure
//!
//! This is a facade crate that re-exports from:
//! - [`hostbridge_core`] - Errors, configuration, lifecycle states, ref counting
//! - [`hostbridge_dispatch`] - Host loop and dispatch channels
//! - [`hostbridge_binding`] - Bindings, engine traits and coordinators
//! - [`hostbridge_runtime`] - Engine runtime and blocking bridge
//! - [`hostbridge_logging`] - Tracing to host log sink

mod bridge;

pub use bridge::{Bridge, init};

// Re-export core types
pub use hostbridge_core::{
    BindingOptions, BindingState, BridgeConfig, BridgeError, BridgeResult, CompletionLatch,
    ERROR_CODE_SUCCESS, EngineError, LogLevel, RefHandle, WeakRefHandle,
};

// Re-export the host side
pub use hostbridge_dispatch::{
    ChannelState, ChannelStats, DispatchChannel, DispatchGate, EnqueueOutcome, Host, HostCell,
    HostHandle, HostId, HostObjectId, RetireMode, WeakHostRef,
};

// Re-export bindings
pub use hostbridge_binding::{
    BindingId, BindingKind, BindingTracker, Client, ClientCallbacks, ClientEngine,
    ClientLifecycle, ClientSink, Connection, ConnectionCallbacks, ConnectionEngine,
    ConnectionSink, OperationSink, PublishEvent, Stream, StreamCallbacks, StreamEngine,
    StreamSink,
};

// Re-export the engine runtime
pub use hostbridge_runtime::{
    BlockingBridge, Credentials, CredentialsProvider, EngineRuntime, RuntimeConfig,
    ShutdownHandle, ShutdownSignal, StaticCredentialsProvider,
};

// Re-export logging
pub use hostbridge_logging::{HostLogLayer, LogRecord, LogSink, LogSinkManager, ReloadHandle};

/// In-process engine, enabled with the `loopback` feature
#[cfg(feature = "loopback")]
pub mod loopback {
    pub use hostbridge_loopback::*;
}

// Re-export common dependencies that engine authors need
pub use async_trait::async_trait;
pub use serde;
pub use serde_json;
pub use tokio;
pub use tracing;

/// Prelude module for convenient imports.
///
/// Use `use hostbridge::prelude::*;` to import commonly used types.
pub mod prelude {
    pub use crate::{
        BindingOptions, BindingState, Bridge, BridgeConfig, BridgeError, BridgeResult, Client,
        ClientCallbacks, ClientEngine, ClientLifecycle, ClientSink, Connection,
        ConnectionCallbacks, ConnectionEngine, ConnectionSink, EngineError, Host, LogLevel,
        OperationSink, PublishEvent, Stream, StreamCallbacks, StreamEngine, StreamSink,
        async_trait,
    };

    pub use serde::{Deserialize, Serialize};
    pub use std::sync::Arc;
    pub use std::time::Duration;
}
