//! hostbridge-binding - Bindings between engine resources and host values
//!
//! This crate provides:
//! - [`Binding`] the reference-counted composite behind every host wrapper
//! - [`ConnectionEngine`], [`StreamEngine`], [`ClientEngine`] the engine interface
//! - [`Connection`], [`Stream`], [`Client`] the host-facing lifecycle coordinators
//! - [`ConnectionSink`], [`StreamSink`], [`ClientSink`], [`OperationSink`] the engine-facing callbacks
//! - [`BindingTracker`] live-binding accounting for leak diagnostics
//!
//! # Threading
//!
//! Coordinators are created and used on the host thread only (they take a
//! `&Host`). Sinks are `Send + Sync` and may be called from any engine
//! thread at any time, including after the wrapper has been closed or
//! collected; late events are discarded on the host thread.

mod binding;
mod client;
mod connection;
mod engine;
mod native;
mod operation;
mod sinks;
mod stream;
mod tracker;

#[cfg(test)]
mod scripted;

pub use binding::Binding;
pub use client::{Client, ClientCallbacks};
pub use connection::{Connection, ConnectionCallbacks};
pub use engine::{ClientEngine, ClientLifecycle, ConnectionEngine, StreamEngine};
pub use native::{NativeHandle, Releaser};
pub use operation::OperationSink;
pub use sinks::{ClientSink, ConnectionSink, PublishEvent, StreamSink};
pub use stream::{Stream, StreamCallbacks, StreamHandle};
pub use tracker::{BindingId, BindingKind, BindingTracker};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        BindingKind, BindingTracker, Client, ClientCallbacks, ClientEngine, ClientLifecycle,
        Connection, ConnectionCallbacks, ConnectionEngine, PublishEvent, Stream, StreamCallbacks,
        StreamEngine,
    };
}
