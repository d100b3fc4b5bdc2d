//! hostbridge-runtime - Engine-side Tokio runtime
//!
//! This crate provides:
//! - [`EngineRuntime`] the multithreaded runtime engines run their work on
//! - [`BlockingBridge`] bounded blocking calls from non-engine threads,
//!   including the credential fetch-and-wait
//! - [`ShutdownHandle`] / [`ShutdownSignal`] graceful shutdown broadcast

mod bridge;
mod credentials;
mod runtime;
mod shutdown;

pub use bridge::BlockingBridge;
pub use credentials::{Credentials, CredentialsProvider, StaticCredentialsProvider};
pub use runtime::{EngineRuntime, RuntimeConfig};
pub use shutdown::{ShutdownHandle, ShutdownSignal};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        BlockingBridge, Credentials, CredentialsProvider, EngineRuntime, RuntimeConfig,
        ShutdownHandle, ShutdownSignal, StaticCredentialsProvider,
    };
}
