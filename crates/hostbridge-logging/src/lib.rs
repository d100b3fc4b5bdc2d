//! hostbridge-logging - Tracing to host log sink bridge
//!
//! This crate provides:
//! - [`HostLogLayer`] tracing layer that hands events to a host-provided sink
//! - [`LogSinkManager`] holding the sink and the level filter it applies
//! - [`ReloadHandle`] for changing the level after initialization

mod layer;
mod reload;
mod sink;

pub use hostbridge_core::LogLevel;
pub use layer::{HostLogLayer, init_logging};
pub use reload::ReloadHandle;
pub use sink::{LogRecord, LogSink, LogSinkManager};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{HostLogLayer, LogLevel, LogRecord, LogSink, LogSinkManager, init_logging};
}
