//! hostbridge-loopback - In-process engine for tests and demos
//!
//! This crate provides:
//! - [`LoopbackEngine`] implementing every hostbridge engine trait on an
//!   [`EngineRuntime`](hostbridge_runtime::EngineRuntime)
//! - [`LoopbackOptions`] fault injection read from binding options
//!
//! Connections echo what is sent on them, streams replay their request as
//! the response body, and clients fan publishes out to every client
//! subscribed to the topic.

mod engine;
mod options;

pub use engine::{
    ERROR_NOT_CONNECTED, ERROR_REJECTED, ERROR_STREAM_ACTIVE, LoopbackClient, LoopbackConnection,
    LoopbackEngine, LoopbackStream, ReleaseCounts,
};
pub use options::LoopbackOptions;
